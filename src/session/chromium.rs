//! Chromium-based session driver using chromiumoxide.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, RequestId,
    Response as NetworkResponse,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

use super::{BrowserEngine, FieldHandle, PageDriver};
use crate::capture::{CaptureError, CapturedResponse, ExchangeHead, ResponseMatcher};

/// Desktop Chrome identity presented to the site.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Retry cadence for response bodies still streaming in when the head
/// event arrives.
const BODY_RETRY: Duration = Duration::from_millis(150);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. POSRELAY_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("POSRELAY_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.posrelay/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".posrelay/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".posrelay/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".posrelay/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".posrelay/chromium/chrome-linux64/chrome"),
                home.join(".posrelay/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    if let Ok(path) = which::which("google-chrome") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium") {
        return Some(path);
    }
    if let Ok(path) = which::which("chromium-browser") {
        return Some(path);
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Headless Chromium engine, one per process.
pub struct ChromiumEngine {
    browser: Browser,
}

impl ChromiumEngine {
    /// Launch a headless instance configured for the POS site: Japanese
    /// locale, desktop identity, container-safe flags.
    pub async fn launch() -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set POSRELAY_CHROMIUM_PATH or install google-chrome.")?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--lang=ja-JP")
            .arg(format!("--user-agent={USER_AGENT}"))
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task; it must run for the browser's lifetime.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        Ok(Box::new(ChromiumPage { page }))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .context("browser close failed")?;
        let _ = self.browser.wait().await;
        Ok(())
    }
}

/// A single Chromium page.
pub struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    /// Fetch a response body, retrying while Chromium is still buffering
    /// it. `Network.getResponseBody` rejects until the resource finishes
    /// loading, which regularly postdates the responseReceived event.
    async fn response_body(
        &self,
        request_id: RequestId,
        deadline: Instant,
    ) -> Result<String, CaptureError> {
        loop {
            match self
                .page
                .execute(GetResponseBodyParams::new(request_id.clone()))
                .await
            {
                Ok(reply) => {
                    let returns = reply.result;
                    if returns.base64_encoded {
                        let bytes = base64::engine::general_purpose::STANDARD
                            .decode(returns.body.as_bytes())
                            .map_err(|e| CaptureError::Body(format!("base64 body: {e}")))?;
                        return Ok(String::from_utf8_lossy(&bytes).into_owned());
                    }
                    return Ok(returns.body);
                }
                Err(e) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(CaptureError::Body(format!(
                            "body never became available: {e}"
                        )));
                    }
                    tokio::time::sleep(BODY_RETRY.min(remaining)).await;
                }
            }
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation to {url} timed out after {timeout:?}"))?
            .with_context(|| format!("navigation to {url} failed"))?;

        // Let the load lifecycle finish inside what is left of the budget.
        let remaining = timeout.saturating_sub(started.elapsed());
        let _ = tokio::time::timeout(remaining, self.page.wait_for_navigation()).await;
        Ok(())
    }

    async fn settle(&self, window: Duration) {
        // CDP has no portable network-idle signal. Let the current
        // navigation finish its lifecycle, bounded, then give follow-up
        // XHRs a beat.
        let _ = tokio::time::timeout(window, self.page.wait_for_navigation()).await;
        tokio::time::sleep(Duration::from_secs(1).min(window)).await;
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn query_first(&self, selectors: &[&str]) -> Result<Option<Box<dyn FieldHandle>>> {
        for &selector in selectors {
            if let Ok(element) = self.page.find_element(selector).await {
                trace!(selector, "selector hit");
                return Ok(Some(Box::new(ChromiumField { element })));
            }
        }
        Ok(None)
    }

    async fn find_by_text(
        &self,
        scope: &str,
        pattern: &Regex,
    ) -> Result<Option<Box<dyn FieldHandle>>> {
        let Ok(elements) = self.page.find_elements(scope).await else {
            return Ok(None);
        };
        for element in elements {
            let text = element.inner_text().await.ok().flatten().unwrap_or_default();
            if pattern.is_match(text.trim()) {
                return Ok(Some(Box::new(ChromiumField { element })));
            }
        }
        Ok(None)
    }

    async fn find_by_label(&self, pattern: &Regex) -> Result<Option<Box<dyn FieldHandle>>> {
        let Ok(labels) = self.page.find_elements("label").await else {
            return Ok(None);
        };
        for label in labels {
            let text = label.inner_text().await.ok().flatten().unwrap_or_default();
            if !pattern.is_match(text.trim()) {
                continue;
            }
            // for-attribute linkage outranks a nested input.
            if let Ok(Some(target)) = label.attribute("for").await {
                if let Ok(element) = self.page.find_element(format!("input[id='{target}']")).await
                {
                    return Ok(Some(Box::new(ChromiumField { element })));
                }
            }
            if let Ok(element) = label.find_element("input").await {
                return Ok(Some(Box::new(ChromiumField { element })));
            }
        }
        Ok(None)
    }

    async fn wait_for_navigation(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.page.wait_for_navigation()).await;
    }

    async fn capture_response(
        &mut self,
        target_url: &str,
        matcher: &ResponseMatcher,
        timeout: Duration,
    ) -> Result<CapturedResponse, CaptureError> {
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(|e| CaptureError::Engine(anyhow!("Network.enable failed: {e}")))?;

        // Subscribe first, navigate second: the data call often fires
        // during the initial load.
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| CaptureError::Engine(anyhow!("response listener failed: {e}")))?;

        let deadline = Instant::now() + timeout;

        tokio::time::timeout(timeout, self.page.goto(target_url))
            .await
            .map_err(|_| CaptureError::Engine(anyhow!("navigation to {target_url} timed out")))?
            .map_err(|e| {
                CaptureError::Engine(anyhow!("navigation to {target_url} failed: {e}"))
            })?;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CaptureError::Timeout(timeout));
            }
            let event = match tokio::time::timeout(remaining, responses.next()).await {
                Err(_) => return Err(CaptureError::Timeout(timeout)),
                Ok(None) => {
                    return Err(CaptureError::Engine(anyhow!("network event stream closed")))
                }
                Ok(Some(event)) => event,
            };

            let head = exchange_head(&event.response);
            if !matcher.matches(&head) {
                trace!(url = %head.url, status = head.status, "exchange skipped");
                continue;
            }
            debug!(url = %head.url, "exchange matched");

            let body = self.response_body(event.request_id.clone(), deadline).await?;
            let json: Value = serde_json::from_str(&body).map_err(|e| {
                CaptureError::Body(format!("matched response is not valid JSON: {e}"))
            })?;
            return Ok(CapturedResponse {
                url: head.url,
                status: head.status,
                body: json,
            });
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.page
            .save_screenshot(
                ScreenshotParams::builder().full_page(true).build(),
                path,
            )
            .await
            .with_context(|| format!("screenshot to {} failed", path.display()))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let _ = self.page.close().await;
        Ok(())
    }
}

/// Project a CDP response head into the matcher's view of an exchange.
fn exchange_head(response: &NetworkResponse) -> ExchangeHead {
    let mut headers = BTreeMap::new();
    if let Ok(Value::Object(map)) = serde_json::to_value(&response.headers) {
        for (name, value) in map {
            if let Value::String(value) = value {
                headers.insert(name.to_ascii_lowercase(), value);
            }
        }
    }
    // Chromium reports the sniffed MIME type even when the header got
    // stripped by an intermediary.
    headers
        .entry("content-type".to_string())
        .or_insert_with(|| response.mime_type.clone());

    ExchangeHead {
        url: response.url.clone(),
        status: response.status as u16,
        headers,
    }
}

/// Handle to a DOM form control.
pub struct ChromiumField {
    element: Element,
}

#[async_trait]
impl FieldHandle for ChromiumField {
    async fn fill(&self, value: &str) -> Result<()> {
        self.element.click().await.context("focus failed")?;
        self.element.type_str(value).await.context("typing failed")?;
        Ok(())
    }

    async fn click(&self) -> Result<()> {
        self.element.click().await.context("click failed")?;
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        self.element
            .press_key("Enter")
            .await
            .context("key press failed")?;
        Ok(())
    }
}
