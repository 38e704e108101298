//! Append-only session history.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use wyrm_core::{Result, SessionRecord};

/// Appends `You: ..`/`AI: ..` blocks to a history file.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    path: PathBuf,
}

impl SessionRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one exchange, creating the file if needed.
    ///
    /// The block is written with a single `write_all` on an append-mode
    /// handle, so earlier records are never rewritten.
    pub fn record(&self, query: &str, response: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(SessionRecord::new(query, response).to_string().as_bytes())?;

        debug!("Recorded session entry to {}", self.path.display());
        Ok(())
    }

    /// The whole history, verbatim. `None` if nothing was ever recorded.
    pub fn history(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(if content.is_empty() { None } else { Some(content) })
    }
}
