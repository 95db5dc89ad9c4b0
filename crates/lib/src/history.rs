//! # Query History
//!
//! Where [`QueryAttempt`] records go once the orchestrator has finished with
//! them. Persistence is behind [`HistorySink`] so callers can plug in their own
//! store; [`JsonlHistorySink`] appends one JSON object per line to a file.

use crate::{errors::AskError, types::QueryAttempt};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Persists query attempts.
#[async_trait]
pub trait HistorySink: Send + Sync + Debug {
    async fn record(&self, attempt: &QueryAttempt) -> Result<(), AskError>;
}

/// Discards every record. Useful when history is not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHistorySink;

#[async_trait]
impl HistorySink for NoopHistorySink {
    async fn record(&self, _attempt: &QueryAttempt) -> Result<(), AskError> {
        Ok(())
    }
}

/// Appends attempts to a JSON Lines file, creating it and its parent
/// directories on first write.
#[derive(Debug)]
pub struct JsonlHistorySink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistorySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistorySink for JsonlHistorySink {
    async fn record(&self, attempt: &QueryAttempt) -> Result<(), AskError> {
        let mut line = serde_json::to_string(attempt)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                AskError::HistoryWrite(format!("{}: {e}", parent.display()))
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AskError::HistoryWrite(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AskError::HistoryWrite(format!("{}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| AskError::HistoryWrite(format!("{}: {e}", self.path.display())))?;

        debug!(id = %attempt.id, path = %self.path.display(), "Query attempt recorded.");
        Ok(())
    }
}
