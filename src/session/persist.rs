//! Durable session snapshot storage.
//!
//! A single JSON file holds `{user, access_token, is_authenticated}` and
//! nothing else. Writes go through a temp file and an atomic rename so a
//! crash mid-write never leaves a truncated snapshot behind.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::PersistedSession;

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot, if one exists.
    ///
    /// A corrupt file is treated the same as a missing one: the caller
    /// starts logged out rather than failing startup over stale state.
    pub fn load(&self) -> Result<Option<PersistedSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                debug!(error = %e, "discarding unreadable session snapshot");
                Ok(None)
            }
        }
    }

    pub fn save(&self, snapshot: &PersistedSession) -> Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .context("Failed to create temporary session file")?;
        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize session")?;
        tmp.write_all(json.as_bytes())
            .context("Failed to write session snapshot")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace session file: {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file: {}", self.path.display()))?;
        }
        Ok(())
    }
}
