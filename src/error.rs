//! Run-level error taxonomy and exit codes.
//!
//! Every way a run can die maps onto one variant here, and every variant
//! maps onto the exit code the surrounding scheduler keys on: 1 for
//! authentication or unexpected failures, 2 when no payload could be
//! captured or extracted, 3 when the webhook did not acknowledge.

use std::time::Duration;

use thiserror::Error;

/// Fatal outcome of an acquisition run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Every login candidate left the session on a login-like URL.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No network exchange matched within the observation window.
    #[error("no matching data response within {0:?}")]
    CaptureTimeout(Duration),

    /// The captured payload held no record array within two levels.
    #[error("no record array in captured payload (body head: {snippet})")]
    NoRecords { snippet: String },

    /// The webhook call failed or came back without the acknowledgment.
    #[error("webhook delivery failed: {0}")]
    Delivery(String),

    /// Everything else: engine crashes, decode failures, filesystem.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl RunError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Auth(_) | RunError::Fatal(_) => 1,
            RunError::CaptureTimeout(_) | RunError::NoRecords { .. } => 2,
            RunError::Delivery(_) => 3,
        }
    }
}
