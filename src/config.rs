//! Environment-driven configuration.
//!
//! The tool runs unattended, so everything comes from environment
//! variables with CLI overrides layered on top by the binary. Secrets
//! are never logged in full; summaries carry presence and length only.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use url::Url;

/// Query parameter carrying the target category.
pub const GENRE_PARAM: &str = "genreId";

/// Path of the inventory view inside the authenticated area.
pub const TARGET_PATH: &str = "/auth/item";

/// Login credentials for the POS backoffice.
///
/// Debug formatting is masked. The literal values are only ever typed
/// into the login form itself.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &mask(Some(&self.email)))
            .field("password", &mask(Some(&self.password)))
            .finish()
    }
}

/// Wall-clock bound for each pipeline step.
#[derive(Debug, Clone)]
pub struct StepTimeouts {
    /// Full page navigation.
    pub navigation: Duration,
    /// Post-navigation settle window (network-idle approximation).
    pub settle: Duration,
    /// Credential form probing, per strategy.
    pub locator: Duration,
    /// Navigation wait after submitting the form.
    pub submission: Duration,
    /// Observation window for the data response.
    pub capture: Duration,
    /// Webhook POST round trip.
    pub delivery: Duration,
}

impl Default for StepTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            settle: Duration::from_secs(15),
            locator: Duration::from_secs(7),
            submission: Duration::from_secs(30),
            capture: Duration::from_secs(60),
            delivery: Duration::from_secs(30),
        }
    }
}

/// Everything one run needs, resolved once at startup.
pub struct Config {
    pub credentials: Credentials,
    /// Webhook endpoint. Treated as a secret: GAS-style URLs are
    /// capability URLs.
    pub webhook_url: String,
    pub webhook_secret: String,
    /// Category id interpolated into the target URL.
    pub genre_id: String,
    /// Origin the POS frontend and its API live on.
    pub base_origin: Url,
    /// Explicit login entry URL, tried before the conventional paths.
    pub login_url: Option<Url>,
    /// Directory debug artifacts land in.
    pub debug_dir: PathBuf,
    pub timeouts: StepTimeouts,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Required: `POS_EMAIL`, `POS_PASSWORD`, `GAS_WEBHOOK_URL`,
    /// `GAS_SHARED_SECRET`. Optional: `GENRE_ID` (default 137),
    /// `POS_BASE` (default https://pos.mycalinks.com), `POS_LOGIN_URL`,
    /// `POSRELAY_DEBUG_DIR` (default `debug`). Step timeouts accept
    /// millisecond overrides via `NAV_TIMEOUT_MS`, `SETTLE_MS`,
    /// `LOCATOR_TIMEOUT_MS`, `SUBMIT_TIMEOUT_MS`, `CAPTURE_TIMEOUT_MS`
    /// and `DELIVERY_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        let credentials = Credentials {
            email: require("POS_EMAIL")?,
            password: require("POS_PASSWORD")?,
        };
        let webhook_url = require("GAS_WEBHOOK_URL")?;
        let webhook_secret = require("GAS_SHARED_SECRET")?;

        let genre_id = std::env::var("GENRE_ID").unwrap_or_else(|_| "137".to_string());
        let base = std::env::var("POS_BASE")
            .unwrap_or_else(|_| "https://pos.mycalinks.com".to_string());
        let base_origin = Url::parse(base.trim())
            .with_context(|| format!("POS_BASE is not a valid URL: {base}"))?;

        let login_url = match std::env::var("POS_LOGIN_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                Url::parse(raw.trim())
                    .with_context(|| format!("POS_LOGIN_URL is not a valid URL: {raw}"))?,
            ),
            _ => None,
        };

        let debug_dir = PathBuf::from(
            std::env::var("POSRELAY_DEBUG_DIR").unwrap_or_else(|_| "debug".to_string()),
        );

        let mut timeouts = StepTimeouts::default();
        override_ms(&mut timeouts.navigation, "NAV_TIMEOUT_MS");
        override_ms(&mut timeouts.settle, "SETTLE_MS");
        override_ms(&mut timeouts.locator, "LOCATOR_TIMEOUT_MS");
        override_ms(&mut timeouts.submission, "SUBMIT_TIMEOUT_MS");
        override_ms(&mut timeouts.capture, "CAPTURE_TIMEOUT_MS");
        override_ms(&mut timeouts.delivery, "DELIVERY_TIMEOUT_MS");

        Ok(Self {
            credentials,
            webhook_url,
            webhook_secret,
            genre_id,
            base_origin,
            login_url,
            debug_dir,
            timeouts,
        })
    }

    /// URL of the inventory view for the configured genre.
    pub fn target_url(&self) -> String {
        let origin = self.base_origin.as_str().trim_end_matches('/');
        format!("{origin}{TARGET_PATH}?{GENRE_PARAM}={}", self.genre_id)
    }

    /// Log the resolved configuration with secrets masked.
    pub fn log_summary(&self) {
        info!(
            email = %mask(Some(&self.credentials.email)),
            password = %mask(Some(&self.credentials.password)),
            webhook_url = %mask(Some(&self.webhook_url)),
            webhook_secret = %mask(Some(&self.webhook_secret)),
            genre_id = %self.genre_id,
            base = %self.base_origin,
            login_override = self.login_url.is_some(),
            "configuration loaded"
        );
    }
}

/// Mask a secret for logging: presence and length only.
pub fn mask(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => format!("(len:{})", s.chars().count()),
        _ => "(missing)".to_string(),
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} is not set"))
}

fn override_ms(slot: &mut Duration, name: &str) {
    if let Ok(raw) = std::env::var(name) {
        match raw.trim().parse::<u64>() {
            Ok(ms) => *slot = Duration::from_millis(ms),
            Err(_) => warn!(var = name, value = %raw, "ignoring non-numeric timeout override"),
        }
    }
}
