//! Credential form location strategies.
//!
//! Login layouts differ per deployment: some render the form directly,
//! some hide it behind a visible "ログイン" control, some only mark the
//! fields up through accessible labels. Each variant is a
//! [`LocatorStrategy`]; the [`FormLocator`] runs them in priority order
//! and the first one to produce both fields wins. Failed strategies do
//! not roll back side effects: a modal opened by one attempt is simply
//! the page state the next strategy works against.

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::session::{FieldHandle, PageDriver};

/// Selector alternatives for the email field, first match wins.
pub const EMAIL_SELECTORS: &[&str] = &[
    "input[type='email']",
    "input[name='email']",
    "input[autocomplete='username']",
];

/// Selector alternatives for the password field, first match wins.
pub const PASSWORD_SELECTORS: &[&str] = &[
    "input[type='password']",
    "input[name='password']",
    "input[autocomplete='current-password']",
];

/// Scope of clickable things that might open or submit a login form.
pub const CLICKABLE_SCOPE: &str = "button, a, [role='button'], input[type='submit']";

/// Pause after activating a login trigger, before re-probing the DOM.
const TRIGGER_SETTLE: Duration = Duration::from_millis(500);

/// Poll interval while waiting for late-rendered fields.
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Visible text of a login affordance, Japanese or English.
pub fn login_text_pattern() -> Regex {
    Regex::new(r"(?i)ログイン|sign[\s_-]?in|log[\s_-]?in").expect("valid regex")
}

/// Label vocabulary for the identifier field.
pub fn email_label_pattern() -> Regex {
    Regex::new(r"(?i)メール|e-?mail").expect("valid regex")
}

/// Label vocabulary for the secret field.
pub fn password_label_pattern() -> Regex {
    Regex::new(r"(?i)パスワード|password").expect("valid regex")
}

/// A located email/password pair. Lives for one attempt.
pub struct FieldPair {
    pub email: Box<dyn FieldHandle>,
    pub password: Box<dyn FieldHandle>,
}

/// One way of finding the credential form on a page.
#[async_trait]
pub trait LocatorStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Try to find both fields. `None` means "not present this way";
    /// the caller treats errors the same and moves on.
    async fn try_locate(
        &self,
        page: &dyn PageDriver,
        budget: Duration,
    ) -> Result<Option<FieldPair>>;
}

/// Strategy 1: the form is already in the DOM with conventional
/// attributes.
pub struct DirectForm;

#[async_trait]
impl LocatorStrategy for DirectForm {
    fn name(&self) -> &'static str {
        "direct-form"
    }

    async fn try_locate(
        &self,
        page: &dyn PageDriver,
        budget: Duration,
    ) -> Result<Option<FieldPair>> {
        probe_fields(page, budget).await
    }
}

/// Strategy 2: a visible login affordance opens the form first.
pub struct TriggerThenForm;

#[async_trait]
impl LocatorStrategy for TriggerThenForm {
    fn name(&self) -> &'static str {
        "trigger-then-form"
    }

    async fn try_locate(
        &self,
        page: &dyn PageDriver,
        budget: Duration,
    ) -> Result<Option<FieldPair>> {
        let pattern = login_text_pattern();
        let Some(trigger) = page.find_by_text(CLICKABLE_SCOPE, &pattern).await? else {
            return Ok(None);
        };
        trigger.click().await?;
        tokio::time::sleep(TRIGGER_SETTLE).await;
        probe_fields(page, budget).await
    }
}

/// Strategy 3: fields reachable only through their accessible labels.
pub struct LabeledFields;

#[async_trait]
impl LocatorStrategy for LabeledFields {
    fn name(&self) -> &'static str {
        "labeled-fields"
    }

    async fn try_locate(
        &self,
        page: &dyn PageDriver,
        _budget: Duration,
    ) -> Result<Option<FieldPair>> {
        let email = page.find_by_label(&email_label_pattern()).await?;
        let password = page.find_by_label(&password_label_pattern()).await?;
        match (email, password) {
            (Some(email), Some(password)) => Ok(Some(FieldPair { email, password })),
            _ => Ok(None),
        }
    }
}

/// Poll for the email/password pair until both are present or `budget`
/// runs out.
///
/// Client-rendered login pages attach their inputs well after load, so a
/// single query is not enough. The pair is probed together: a
/// half-rendered form is not submittable anyway. Always probes at least
/// once, so a zero budget still sees an already-rendered form.
async fn probe_fields(page: &dyn PageDriver, budget: Duration) -> Result<Option<FieldPair>> {
    let deadline = Instant::now() + budget;
    loop {
        let email = page.query_first(EMAIL_SELECTORS).await?;
        let password = page.query_first(PASSWORD_SELECTORS).await?;
        if let (Some(email), Some(password)) = (email, password) {
            return Ok(Some(FieldPair { email, password }));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        tokio::time::sleep(PROBE_INTERVAL.min(remaining)).await;
    }
}

/// Ordered strategy cascade; first success wins.
pub struct FormLocator {
    strategies: Vec<Box<dyn LocatorStrategy>>,
}

impl Default for FormLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormLocator {
    /// The standard three-strategy cascade.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(DirectForm),
                Box::new(TriggerThenForm),
                Box::new(LabeledFields),
            ],
        }
    }

    /// Run the strategies in priority order against `page`.
    ///
    /// A strategy error is logged and counts as "not found" for that
    /// strategy; the next one still runs.
    pub async fn locate(
        &self,
        page: &dyn PageDriver,
        budget: Duration,
    ) -> Option<(FieldPair, &'static str)> {
        for strategy in &self.strategies {
            match strategy.try_locate(page, budget).await {
                Ok(Some(pair)) => {
                    debug!(strategy = strategy.name(), "credential form located");
                    return Some((pair, strategy.name()));
                }
                Ok(None) => {
                    debug!(strategy = strategy.name(), "no credential form this way");
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "strategy failed");
                }
            }
        }
        None
    }
}
