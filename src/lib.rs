// Copyright 2026 Posrelay Contributors
// SPDX-License-Identifier: Apache-2.0

//! Posrelay library: resilient acquisition pipeline for POS backoffices.
//!
//! Drives a headless browser through an unpredictable login flow,
//! captures the inventory JSON feed off the network channel, normalizes
//! it into a flat record list and relays that list to a webhook. This
//! library crate exposes the pipeline's modules for integration testing;
//! the `posrelay` binary wires them to a real Chromium.

pub mod auth;
pub mod capture;
pub mod config;
pub mod deliver;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod session;
