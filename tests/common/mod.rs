//! Scripted fakes of the session traits.
//!
//! Tests describe a small world of pages, forms and wire exchanges; the
//! fake driver plays that world back against the real cascade, matcher
//! and pipeline code. No browser involved.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use posrelay::capture::{CaptureError, CapturedResponse, ExchangeHead, ResponseMatcher};
use posrelay::config::{Credentials, StepTimeouts};
use posrelay::session::{BrowserEngine, FieldHandle, PageDriver};

// ── World Model ──

/// Form behavior of one scripted page.
#[derive(Clone, Default)]
pub struct FakeForm {
    /// Strategy 1 finds the fields immediately.
    pub direct_fields: bool,
    /// Visible trigger text; clicking it reveals the fields.
    pub trigger_text: Option<String>,
    /// Strategy 3 finds the fields through labels.
    pub labeled_fields: bool,
    /// A submit control is present.
    pub has_submit: bool,
    /// URL the page lands on after submission.
    pub lands_on: Option<String>,
}

/// One scripted network exchange the fake page "observes".
#[derive(Clone)]
pub struct FakeExchange {
    pub head: ExchangeHead,
    pub body: Value,
}

/// Which control a fake field handle stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    Email,
    Password,
    Trigger,
    Submit,
}

/// Shared mutable state behind the fake engine, pages and fields.
#[derive(Default)]
pub struct World {
    /// Scripted pages by URL.
    pub pages: HashMap<String, FakeForm>,
    /// URLs whose navigation fails outright.
    pub nav_failures: Vec<String>,
    /// Exchanges replayed through the matcher during capture.
    pub exchanges: Vec<FakeExchange>,
    /// Where the (single) page currently is.
    pub current_url: String,
    /// Trigger was clicked on the current page.
    pub revealed: bool,
    /// Every navigation, in order.
    pub goto_log: Vec<String>,
    /// Every fill, in order.
    pub filled: Vec<(FieldRole, String)>,
    /// Screenshot artifact names, in order.
    pub screenshots: Vec<String>,
    pub closed_pages: usize,
    pub shutdowns: usize,
}

pub type SharedWorld = Arc<Mutex<World>>;

pub fn world() -> SharedWorld {
    Arc::new(Mutex::new(World::default()))
}

// ── Helpers ──

/// Exchange head with the given content type.
pub fn head(url: &str, status: u16, content_type: &str) -> ExchangeHead {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), content_type.to_string());
    ExchangeHead {
        url: url.to_string(),
        status,
        headers,
    }
}

pub fn creds() -> Credentials {
    Credentials {
        email: "user@example.com".to_string(),
        password: "hunter2".to_string(),
    }
}

/// Timeouts that keep fake-backed tests fast: zero poll budgets, no
/// settle windows.
pub fn instant_timeouts() -> StepTimeouts {
    StepTimeouts {
        navigation: Duration::from_millis(10),
        settle: Duration::ZERO,
        locator: Duration::ZERO,
        submission: Duration::ZERO,
        capture: Duration::from_millis(10),
        delivery: Duration::from_secs(5),
    }
}

// ── Fake Engine ──

pub struct FakeEngine {
    pub world: SharedWorld,
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>> {
        Ok(Box::new(FakePage::new(Arc::clone(&self.world))))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.world.lock().unwrap().shutdowns += 1;
        Ok(())
    }
}

// ── Fake Page ──

pub struct FakePage {
    world: SharedWorld,
}

impl FakePage {
    pub fn new(world: SharedWorld) -> Self {
        Self { world }
    }

    fn form(&self) -> FakeForm {
        let world = self.world.lock().unwrap();
        world
            .pages
            .get(&world.current_url)
            .cloned()
            .unwrap_or_default()
    }

    fn field(&self, role: FieldRole) -> Box<dyn FieldHandle> {
        let page_url = self.world.lock().unwrap().current_url.clone();
        Box::new(FakeField {
            world: Arc::clone(&self.world),
            role,
            page_url,
        })
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        let mut world = self.world.lock().unwrap();
        world.goto_log.push(url.to_string());
        if world.nav_failures.iter().any(|u| u == url) {
            return Err(anyhow!("scripted navigation failure for {url}"));
        }
        world.current_url = url.to_string();
        world.revealed = false;
        Ok(())
    }

    async fn settle(&self, _window: Duration) {}

    async fn current_url(&self) -> Result<String> {
        Ok(self.world.lock().unwrap().current_url.clone())
    }

    async fn query_first(&self, selectors: &[&str]) -> Result<Option<Box<dyn FieldHandle>>> {
        let form = self.form();
        let visible = form.direct_fields || self.world.lock().unwrap().revealed;
        let joined = selectors.join(" ");
        if joined.contains("password") {
            return Ok(visible.then(|| self.field(FieldRole::Password)));
        }
        if joined.contains("email") || joined.contains("username") {
            return Ok(visible.then(|| self.field(FieldRole::Email)));
        }
        if joined.contains("submit") {
            return Ok(form.has_submit.then(|| self.field(FieldRole::Submit)));
        }
        Ok(None)
    }

    async fn find_by_text(
        &self,
        _scope: &str,
        pattern: &Regex,
    ) -> Result<Option<Box<dyn FieldHandle>>> {
        let form = self.form();
        if let Some(text) = &form.trigger_text {
            if pattern.is_match(text) {
                return Ok(Some(self.field(FieldRole::Trigger)));
            }
        }
        Ok(None)
    }

    async fn find_by_label(&self, pattern: &Regex) -> Result<Option<Box<dyn FieldHandle>>> {
        let form = self.form();
        if !form.labeled_fields {
            return Ok(None);
        }
        // The label vocabularies are disjoint, so two sample strings are
        // enough to tell which field the caller is after.
        if pattern.is_match("email") {
            return Ok(Some(self.field(FieldRole::Email)));
        }
        if pattern.is_match("password") {
            return Ok(Some(self.field(FieldRole::Password)));
        }
        Ok(None)
    }

    async fn wait_for_navigation(&self, _timeout: Duration) {}

    async fn capture_response(
        &mut self,
        target_url: &str,
        matcher: &ResponseMatcher,
        timeout: Duration,
    ) -> Result<CapturedResponse, CaptureError> {
        let mut world = self.world.lock().unwrap();
        world.goto_log.push(target_url.to_string());
        world.current_url = target_url.to_string();
        // Replay scripted exchanges through the real matcher.
        for exchange in &world.exchanges {
            if matcher.matches(&exchange.head) {
                return Ok(CapturedResponse {
                    url: exchange.head.url.clone(),
                    status: exchange.head.status,
                    body: exchange.body.clone(),
                });
            }
        }
        Err(CaptureError::Timeout(timeout))
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        self.world.lock().unwrap().screenshots.push(name);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.world.lock().unwrap().closed_pages += 1;
        Ok(())
    }
}

// ── Fake Field ──

pub struct FakeField {
    world: SharedWorld,
    role: FieldRole,
    page_url: String,
}

impl FakeField {
    fn land(&self, world: &mut World) {
        let lands_on = world
            .pages
            .get(&self.page_url)
            .and_then(|form| form.lands_on.clone());
        if let Some(url) = lands_on {
            world.current_url = url;
        }
    }
}

#[async_trait]
impl FieldHandle for FakeField {
    async fn fill(&self, value: &str) -> Result<()> {
        self.world
            .lock()
            .unwrap()
            .filled
            .push((self.role, value.to_string()));
        Ok(())
    }

    async fn click(&self) -> Result<()> {
        let mut world = self.world.lock().unwrap();
        match self.role {
            FieldRole::Trigger => world.revealed = true,
            FieldRole::Submit => self.land(&mut world),
            _ => {}
        }
        Ok(())
    }

    async fn press_enter(&self) -> Result<()> {
        if self.role == FieldRole::Password {
            let mut world = self.world.lock().unwrap();
            self.land(&mut world);
        }
        Ok(())
    }
}
