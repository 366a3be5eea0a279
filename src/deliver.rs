//! Webhook delivery.
//!
//! One POST, one verdict. The downstream is an Apps-Script-style
//! endpoint that acknowledges in its body, not its status line: the
//! literal `"ok":true` marker is the contract, and a 200 without it is
//! still a failed delivery. No retry here; the surrounding scheduler
//! re-runs the whole pipeline instead.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::debug;

/// Body marker the webhook uses to acknowledge a delivery.
pub const ACK_MARKER: &str = "\"ok\":true";

/// Outcome of the single delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// The body contained the acknowledgment marker.
    pub acknowledged: bool,
    /// HTTP status, recorded for diagnostics only.
    pub status: u16,
    /// Full response body text.
    pub body: String,
}

/// Client for the downstream webhook.
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
    secret: String,
}

impl WebhookClient {
    /// Build a client for `url`, authorized by the shared `secret`.
    pub fn new(url: &str, secret: &str, timeout: Duration) -> Result<Self> {
        // Default redirect policy: Apps-Script endpoints 302 their POST
        // responses through googleusercontent.
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            http,
            url: url.to_string(),
            secret: secret.to_string(),
        })
    }

    /// POST `{"items": records}` and read the acknowledgment.
    ///
    /// `Err` means the call itself failed (connect, TLS, timeout). A
    /// response without the marker comes back as a receipt with
    /// `acknowledged == false` so the caller can log status and body.
    pub async fn deliver(&self, records: &[Value]) -> Result<DeliveryReceipt> {
        debug!(count = records.len(), "posting records to webhook");
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.secret)
            .json(&json!({ "items": records }))
            .send()
            .await
            .context("webhook request failed")?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("webhook response unreadable")?;

        Ok(DeliveryReceipt {
            acknowledged: body.contains(ACK_MARKER),
            status,
            body,
        })
    }
}
