//! Network exchange model and the response matcher.
//!
//! The browser session surfaces every response it observes as an
//! [`ExchangeHead`]; the [`ResponseMatcher`] is the pure predicate that
//! singles out the inventory data call from telemetry, asset loads and
//! other same-origin JSON traffic. Kept free of CDP types so it can be
//! tested without a browser.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use url::{Origin, Url};

use crate::config::GENRE_PARAM;

/// Status line and headers of one observed network exchange.
#[derive(Debug, Clone)]
pub struct ExchangeHead {
    /// Full response URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: BTreeMap<String, String>,
}

impl ExchangeHead {
    /// The `content-type` header, or an empty string when absent.
    pub fn content_type(&self) -> &str {
        self.headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A matched exchange with its decoded JSON body.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// URL the payload came from.
    pub url: String,
    /// HTTP status (always 200 for matched exchanges).
    pub status: u16,
    /// Decoded JSON body, numbers preserved verbatim.
    pub body: Value,
}

/// Why the observation window produced no payload.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No exchange matched before the window closed.
    #[error("no matching exchange within {0:?}")]
    Timeout(Duration),

    /// An exchange matched but its body could not be read or decoded.
    #[error("matched response body unusable: {0}")]
    Body(String),

    /// The engine failed underneath the observation.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

/// Predicate deciding whether an exchange is the target data payload.
///
/// All four conditions must hold: status 200, a JSON content type, origin
/// equality with the configured base, and a URL marker (an `/api` path
/// segment or the genre query parameter). The marker is what separates
/// the data call from other same-origin JSON responses like config or
/// feature-flag fetches.
#[derive(Debug, Clone)]
pub struct ResponseMatcher {
    origin: Origin,
    path_marker: &'static str,
    query_marker: String,
}

impl ResponseMatcher {
    /// Matcher for the inventory feed served from `base`.
    pub fn new(base: &Url) -> Self {
        Self {
            origin: base.origin(),
            path_marker: "/api",
            query_marker: format!("{GENRE_PARAM}="),
        }
    }

    /// Whether `head` is the exchange this run is waiting for.
    pub fn matches(&self, head: &ExchangeHead) -> bool {
        if head.status != 200 {
            return false;
        }
        if !head
            .content_type()
            .to_ascii_lowercase()
            .contains("application/json")
        {
            return false;
        }
        let Ok(url) = Url::parse(&head.url) else {
            return false;
        };
        if url.origin() != self.origin {
            return false;
        }
        head.url.contains(self.path_marker) || head.url.contains(&self.query_marker)
    }
}
