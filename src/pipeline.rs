//! Acquisition orchestration.
//!
//! One run, strictly sequenced: authenticate, navigate to the inventory
//! view while watching the wire, normalize the payload, deliver. The
//! page opened here is closed on every exit path, and failures leave a
//! classifying screenshot behind before the outcome is reported.

use serde_json::Value;
use tracing::{error, info};

use crate::auth::AuthCascade;
use crate::capture::{CaptureError, ResponseMatcher};
use crate::config::Config;
use crate::deliver::{DeliveryReceipt, WebhookClient};
use crate::diagnostics::DebugSink;
use crate::error::RunError;
use crate::extract::{body_snippet, extract_records, text_snippet};
use crate::session::{BrowserEngine, PageDriver};

/// What a successful run produced.
#[derive(Debug)]
pub struct RunReport {
    /// Number of records forwarded.
    pub records: usize,
    /// Webhook receipt.
    pub receipt: DeliveryReceipt,
}

/// Execute one full acquisition run on `engine`.
pub async fn run(
    config: &Config,
    engine: &dyn BrowserEngine,
    sink: &DebugSink,
) -> Result<RunReport, RunError> {
    let mut page = engine.open_page().await.map_err(RunError::Fatal)?;

    let outcome = drive(config, &mut *page, sink).await;

    if let Err(err) = &outcome {
        // "no-array.png" separates schema drift from everything else.
        let artifact = match err {
            RunError::NoRecords { .. } => "no-array.png",
            _ => "fatal.png",
        };
        sink.page_screenshot(&*page, artifact).await;
    }
    if let Err(e) = page.close().await {
        error!(error = %e, "page close failed");
    }

    outcome
}

/// Run the pipeline on `engine`, then shut the engine down regardless of
/// the outcome. The verdict comes back only after the engine is released.
pub async fn run_and_shutdown(
    config: &Config,
    engine: &mut dyn BrowserEngine,
    sink: &DebugSink,
) -> Result<RunReport, RunError> {
    let outcome = run(config, &*engine, sink).await;
    if let Err(e) = engine.shutdown().await {
        error!(error = %e, "browser shutdown failed");
    }
    outcome
}

/// The run body, separated so `run` can screenshot and close the page on
/// whichever path this exits through.
async fn drive(
    config: &Config,
    page: &mut dyn PageDriver,
    sink: &DebugSink,
) -> Result<RunReport, RunError> {
    // 1. Authenticate.
    let cascade = AuthCascade::new(config.credentials.clone(), config.timeouts.clone());
    cascade
        .authenticate(&mut *page, &config.base_origin, config.login_url.as_ref())
        .await
        .map_err(|e| RunError::Auth(e.to_string()))?;
    sink.page_screenshot(&*page, "after-login.png").await;

    // 2. Navigate to the inventory view and capture the data response.
    let target = config.target_url();
    info!(target = %target, "awaiting inventory response");
    let matcher = ResponseMatcher::new(&config.base_origin);
    let captured = page
        .capture_response(&target, &matcher, config.timeouts.capture)
        .await
        .map_err(|e| match e {
            CaptureError::Timeout(window) => RunError::CaptureTimeout(window),
            CaptureError::Body(detail) => RunError::Fatal(anyhow::anyhow!(detail)),
            CaptureError::Engine(inner) => RunError::Fatal(inner),
        })?;
    info!(url = %captured.url, status = captured.status, "captured inventory response");
    sink.page_screenshot(&*page, "target-page.png").await;
    sink.json("api-sample.json", &captured.body);

    // 3. Normalize the envelope into a record list.
    let records = extract_records(&captured.body);
    if records.is_empty() {
        return Err(RunError::NoRecords {
            snippet: body_snippet(&captured.body),
        });
    }
    let key_sample: Vec<&str> = records[0]
        .as_object()
        .map(|m| m.keys().take(20).map(String::as_str).collect())
        .unwrap_or_default();
    info!(count = records.len(), first_record_keys = ?key_sample, "records extracted");
    sink.json(
        "items-sample.json",
        &Value::Array(records.iter().take(3).cloned().collect()),
    );

    // 4. Deliver.
    let client = WebhookClient::new(
        &config.webhook_url,
        &config.webhook_secret,
        config.timeouts.delivery,
    )
    .map_err(RunError::Fatal)?;
    let receipt = client
        .deliver(&records)
        .await
        .map_err(|e| RunError::Delivery(format!("{e:#}")))?;
    if !receipt.acknowledged {
        return Err(RunError::Delivery(format!(
            "webhook answered {} without acknowledgment: {}",
            receipt.status,
            text_snippet(&receipt.body)
        )));
    }
    info!(status = receipt.status, "delivery acknowledged");

    Ok(RunReport {
        records: records.len(),
        receipt,
    })
}
