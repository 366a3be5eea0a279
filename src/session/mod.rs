//! Browser session abstraction.
//!
//! Defines the `BrowserEngine`, `PageDriver` and `FieldHandle` traits
//! that abstract over the browser engine (currently Chromium via
//! chromiumoxide). The pipeline, cascade and locator only ever see these
//! traits; tests substitute scripted fakes.

pub mod chromium;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use crate::capture::{CaptureError, CapturedResponse, ResponseMatcher};

/// A launched browser engine that can open pages.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a fresh page (tab).
    async fn open_page(&self) -> Result<Box<dyn PageDriver>>;
    /// Shut the browser down. Called on every exit path.
    async fn shutdown(&mut self) -> Result<()>;
}

/// One live page: navigation, DOM probing, network observation.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url` and wait for the load to commit, bounded by
    /// `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()>;

    /// Give in-page scripts a bounded window to finish follow-up
    /// requests after a load.
    async fn settle(&self, window: Duration);

    /// The page's current URL.
    async fn current_url(&self) -> Result<String>;

    /// First element matching any of `selectors`, tried in order.
    async fn query_first(&self, selectors: &[&str]) -> Result<Option<Box<dyn FieldHandle>>>;

    /// First element under the `scope` selector whose visible text
    /// matches `pattern`.
    async fn find_by_text(
        &self,
        scope: &str,
        pattern: &Regex,
    ) -> Result<Option<Box<dyn FieldHandle>>>;

    /// Input associated with a `<label>` whose text matches `pattern`,
    /// through `for`-attribute linkage or nesting.
    async fn find_by_label(&self, pattern: &Regex) -> Result<Option<Box<dyn FieldHandle>>>;

    /// Wait for a navigation triggered by the page itself. A timeout is
    /// not an error: single-page apps swap views without navigating.
    async fn wait_for_navigation(&self, timeout: Duration);

    /// Navigate to `target_url` and return the first observed exchange
    /// accepted by `matcher`, with its decoded JSON body. The
    /// subscription is established before navigation starts so a data
    /// call fired during load cannot be missed.
    async fn capture_response(
        &mut self,
        target_url: &str,
        matcher: &ResponseMatcher,
        timeout: Duration,
    ) -> Result<CapturedResponse, CaptureError>;

    /// Full-page screenshot written to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Close this page.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Transient handle to a form control. Valid for the current attempt
/// only; discarded when the attempt moves on.
#[async_trait]
pub trait FieldHandle: Send + Sync {
    /// Focus the control and type `value` into it.
    async fn fill(&self, value: &str) -> Result<()>;
    /// Click the control.
    async fn click(&self) -> Result<()>;
    /// Press Enter inside the control.
    async fn press_enter(&self) -> Result<()>;
}
