//! Authentication cascade.
//!
//! Nothing about the login flow is stable: the entry URL, the form
//! layout, even whether a form exists at all. The cascade walks an
//! ordered list of candidate login URLs, runs the form-locator
//! strategies on each, submits, and classifies the outcome purely by
//! where the browser ended up. Any error inside one candidate only
//! advances the cascade to the next.

pub mod locator;

use anyhow::Result;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Credentials, StepTimeouts};
use crate::session::PageDriver;
use locator::{login_text_pattern, FieldPair, FormLocator, CLICKABLE_SCOPE};

/// Conventional login path suffixes, probed after the explicit override.
const LOGIN_SUFFIXES: [&str; 4] = ["/auth/login", "/auth", "/login", "/signin"];

/// Submit controls, tried before falling back to text-matched buttons.
const SUBMIT_SELECTORS: &[&str] = &["button[type='submit']", "input[type='submit']"];

/// Every candidate was tried and each one ended on a login-like URL.
#[derive(Debug, Error)]
#[error("exhausted {attempted} login candidate(s) without leaving the login page")]
pub struct AuthExhausted {
    /// Number of candidates attempted.
    pub attempted: usize,
}

/// How a successful login was achieved, for the record.
#[derive(Debug)]
pub struct AuthReport {
    /// Candidate URL the login happened on.
    pub candidate: String,
    /// Locator strategy that produced the form.
    pub strategy: &'static str,
    /// URL the session landed on afterwards.
    pub landed_url: String,
}

/// Ordered login attempt driver.
pub struct AuthCascade {
    credentials: Credentials,
    timeouts: StepTimeouts,
    locator: FormLocator,
}

impl AuthCascade {
    pub fn new(credentials: Credentials, timeouts: StepTimeouts) -> Self {
        Self {
            credentials,
            timeouts,
            locator: FormLocator::new(),
        }
    }

    /// Try every candidate in order; the first non-login landing wins.
    ///
    /// Navigation failures, vanished elements and other per-candidate
    /// errors are logged and swallowed so one broken entry point cannot
    /// mask a working one further down the list.
    pub async fn authenticate(
        &self,
        page: &mut dyn PageDriver,
        base: &Url,
        login_override: Option<&Url>,
    ) -> Result<AuthReport, AuthExhausted> {
        let candidates = candidate_urls(base, login_override);
        for candidate in &candidates {
            match self.attempt(page, candidate).await {
                Ok(Some(report)) => {
                    info!(
                        candidate = %report.candidate,
                        strategy = report.strategy,
                        landed = %report.landed_url,
                        "authenticated"
                    );
                    return Ok(report);
                }
                Ok(None) => {
                    debug!(candidate = %candidate, "candidate did not authenticate");
                }
                Err(e) => {
                    warn!(candidate = %candidate, error = %e, "candidate aborted");
                }
            }
        }
        Err(AuthExhausted {
            attempted: candidates.len(),
        })
    }

    /// One candidate: navigate, locate, fill, submit, classify.
    async fn attempt(
        &self,
        page: &mut dyn PageDriver,
        candidate: &str,
    ) -> Result<Option<AuthReport>> {
        page.goto(candidate, self.timeouts.navigation).await?;
        page.settle(self.timeouts.settle).await;

        let Some((pair, strategy)) = self.locator.locate(&*page, self.timeouts.locator).await
        else {
            return Ok(None);
        };

        pair.email.fill(&self.credentials.email).await?;
        pair.password.fill(&self.credentials.password).await?;
        self.submit(&*page, &pair).await?;
        page.settle(self.timeouts.settle).await;

        let landed_url = page.current_url().await?;
        if is_login_like(&landed_url) {
            return Ok(None);
        }
        Ok(Some(AuthReport {
            candidate: candidate.to_string(),
            strategy,
            landed_url,
        }))
    }

    /// Submit the filled form: a submit control when one exists, a
    /// text-matched login button next, the Enter key inside the password
    /// field as last resort.
    async fn submit(&self, page: &dyn PageDriver, pair: &FieldPair) -> Result<()> {
        let control = match page.query_first(SUBMIT_SELECTORS).await? {
            Some(control) => Some(control),
            None => page.find_by_text(CLICKABLE_SCOPE, &login_text_pattern()).await?,
        };
        match control {
            Some(control) => control.click().await?,
            None => pair.password.press_enter().await?,
        }
        page.wait_for_navigation(self.timeouts.submission).await;
        Ok(())
    }
}

/// Build the ordered candidate list: the explicit override first, then
/// conventional suffixes on the base origin, then the bare origin as a
/// last resort. Duplicates keep their first (highest-priority) slot.
pub fn candidate_urls(base: &Url, login_override: Option<&Url>) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(explicit) = login_override {
        push_unique(&mut candidates, explicit.to_string());
    }
    for suffix in LOGIN_SUFFIXES {
        if let Ok(url) = base.join(suffix) {
            push_unique(&mut candidates, url.to_string());
        }
    }
    push_unique(&mut candidates, base.to_string());
    candidates
}

fn push_unique(list: &mut Vec<String>, url: String) {
    if !list.contains(&url) {
        list.push(url);
    }
}

/// Whether `url`'s path still looks like a login page.
///
/// Terminal-segment matching keeps the authenticated area (`/auth/item`)
/// from being mistaken for the login entry (`/auth`, `/auth/login`).
/// Classification by URL shape alone is an approximation: a failed login
/// that redirects somewhere unrelated would pass it. The sites this runs
/// against expose no better signal.
pub fn is_login_like(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        // Unreadable URL: assume the attempt went nowhere.
        return true;
    };
    let path = parsed.path().trim_end_matches('/').to_ascii_lowercase();
    if path == "/auth" {
        return true;
    }
    let terminal = Regex::new(r"(^|/)(log[_-]?in|sign[_-]?in)$").expect("valid regex");
    terminal.is_match(&path)
}
