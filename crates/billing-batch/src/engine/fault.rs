//! Record-level faults and the handlers that log them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{BatchError, Result};

/// A raw record that could not be parsed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fault {
    /// 1-based position of the record in its source
    pub position: u64,
    /// The record exactly as read
    pub raw: String,
    /// Why parsing failed
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

impl Fault {
    pub fn new(position: u64, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            position,
            raw: raw.into(),
            reason: reason.into(),
            occurred_at: Utc::now(),
        }
    }

    /// The `position|raw` line written to a skip log
    pub fn skip_line(&self) -> String {
        format!("{}|{}", self.position, self.raw)
    }
}

/// Receives every fault a chunk step skips
///
/// Called once per fault, in source order, before the skip limit is checked.
/// An error is fatal to the step.
#[async_trait]
pub trait FaultHandler: Send {
    async fn on_fault(&mut self, fault: &Fault) -> Result<()>;
}

/// Appends `position|raw` lines to a file
///
/// The file is created on the first fault and appended to afterwards, so a
/// run without faults leaves no file behind.
#[derive(Debug, Clone)]
pub struct SkipFileFaultHandler {
    path: PathBuf,
}

impl SkipFileFaultHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

#[async_trait]
impl FaultHandler for SkipFileFaultHandler {
    async fn on_fault(&mut self, fault: &Fault) -> Result<()> {
        let line = fault.skip_line();
        self.append(&line).await.map_err(|e| {
            BatchError::fault_handler(format!(
                "unable to log skipped record {} to {}: {}",
                fault.position,
                self.path.display(),
                e
            ))
        })?;

        debug!(
            position = fault.position,
            path = %self.path.display(),
            "Skipped record logged"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_skip_line_format() {
        let fault = Fault::new(7, "2023,1,abc,,,,", "invalid digit");
        assert_eq!(fault.skip_line(), "7|2023,1,abc,,,,");
    }

    #[tokio::test]
    async fn test_skip_file_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("skips.psv");
        let mut handler = SkipFileFaultHandler::new(&path);

        handler.on_fault(&Fault::new(3, "bad,line", "too few fields")).await.unwrap();
        handler.on_fault(&Fault::new(9, "worse", "too few fields")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "3|bad,line\n9|worse\n");
    }

    #[tokio::test]
    async fn test_skip_file_keeps_existing_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("skips.psv");
        std::fs::write(&path, "1|earlier\n").unwrap();

        let mut handler = SkipFileFaultHandler::new(&path);
        handler.on_fault(&Fault::new(2, "later", "bad")).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1|earlier\n2|later\n");
    }

    #[tokio::test]
    async fn test_unwritable_skip_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending
        let mut handler = SkipFileFaultHandler::new(dir.path());

        let err = handler.on_fault(&Fault::new(1, "x", "bad")).await.unwrap_err();
        assert!(matches!(err, BatchError::FaultHandler(_)));
    }
}
