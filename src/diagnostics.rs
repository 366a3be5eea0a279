//! Debug artifact sink.
//!
//! Operators triage failed runs from artifacts on disk, not by replaying
//! a flaky login against production. The sink owns one directory per run
//! and every write is best-effort: a failed screenshot must never take
//! down a pipeline that was otherwise fine.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::session::PageDriver;

/// Best-effort writer for debug artifacts.
pub struct DebugSink {
    dir: PathBuf,
}

impl DebugSink {
    /// Create the sink, making sure the directory exists.
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create debug dir {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Write a pretty-printed JSON snapshot.
    pub fn json(&self, name: &str, value: &Value) {
        let path = self.dir.join(name);
        let rendered = match serde_json::to_string_pretty(value) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(artifact = name, error = %e, "could not render artifact");
                return;
            }
        };
        match std::fs::write(&path, rendered) {
            Ok(()) => debug!(artifact = name, "artifact written"),
            Err(e) => warn!(artifact = name, error = %e, "could not write artifact"),
        }
    }

    /// Capture a full-page screenshot through the live page.
    pub async fn page_screenshot(&self, page: &dyn PageDriver, name: &str) {
        let path = self.dir.join(name);
        match page.screenshot(&path).await {
            Ok(()) => debug!(artifact = name, "screenshot written"),
            Err(e) => warn!(artifact = name, error = %e, "could not capture screenshot"),
        }
    }

    /// Directory artifacts land in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
