//! Input file staging
//!
//! The first step of the billing job copies the input file into the staging
//! directory under its own file name. An existing copy is overwritten, so a
//! re-run after a partial or complete run ends with the same staged file.
//! An input that already is the staged file is left as it is.

use async_trait::async_trait;
use billing_common::checksum::{verify_copy, ChecksumAlgorithm};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::engine::Tasklet;
use crate::error::{BatchError, Result};

/// Where `source` is staged inside `staging_dir`
pub fn staged_path(source: &Path, staging_dir: &Path) -> Result<PathBuf> {
    let file_name = source.file_name().ok_or_else(|| {
        BatchError::staging(format!("'{}' does not name a file", source.display()))
    })?;
    Ok(staging_dir.join(file_name))
}

/// Copy `source` into `staging_dir` and verify the copy
///
/// Returns the path of the staged file.
pub async fn stage(source: &Path, staging_dir: &Path) -> Result<PathBuf> {
    let target = staged_path(source, staging_dir)?;

    tokio::fs::create_dir_all(staging_dir).await.map_err(|e| {
        BatchError::staging(format!(
            "cannot create staging directory {}: {}",
            staging_dir.display(),
            e
        ))
    })?;

    let canonical_source = tokio::fs::canonicalize(source).await.map_err(|e| {
        BatchError::staging(format!("cannot read {}: {}", source.display(), e))
    })?;
    if tokio::fs::canonicalize(&target).await.ok().as_deref() == Some(canonical_source.as_path()) {
        // Copying a file onto itself truncates it
        info!(target = %target.display(), "Input file is already staged");
        return Ok(target);
    }

    let bytes = tokio::fs::copy(source, &target).await.map_err(|e| {
        BatchError::staging(format!(
            "cannot copy {} to {}: {}",
            source.display(),
            target.display(),
            e
        ))
    })?;

    let checksum = {
        let source = source.to_path_buf();
        let target = target.clone();
        tokio::task::spawn_blocking(move || {
            verify_copy(&source, &target, ChecksumAlgorithm::Sha256)
        })
        .await
        .map_err(|e| BatchError::staging(format!("checksum task failed: {e}")))??
    };

    debug!(checksum = %checksum, "Staged copy verified");
    info!(
        source = %source.display(),
        target = %target.display(),
        bytes,
        "Input file staged"
    );

    Ok(target)
}

/// Tasklet staging the job's input file
#[derive(Debug, Clone)]
pub struct FilePreparationTasklet {
    source: PathBuf,
    staging_dir: PathBuf,
}

impl FilePreparationTasklet {
    pub fn new(source: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            staging_dir: staging_dir.into(),
        }
    }
}

#[async_trait]
impl Tasklet for FilePreparationTasklet {
    async fn execute(&self) -> Result<()> {
        stage(&self.source, &self.staging_dir).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_staged_path_keeps_file_name() {
        let path = staged_path(Path::new("input/billing-2023-01.csv"), Path::new("staging")).unwrap();
        assert_eq!(path, PathBuf::from("staging/billing-2023-01.csv"));

        assert!(staged_path(Path::new("/"), Path::new("staging")).is_err());
    }

    #[tokio::test]
    async fn test_stage_creates_directory_and_copies() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("billing-2023-01.csv");
        std::fs::write(&source, "2023,1,1,555,1.0,1,1\n").unwrap();
        let staging_dir = dir.path().join("staging").join("nested");

        let target = stage(&source, &staging_dir).await.unwrap();

        assert_eq!(target, staging_dir.join("billing-2023-01.csv"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "2023,1,1,555,1.0,1,1\n");
    }

    #[tokio::test]
    async fn test_stage_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("billing.csv");
        std::fs::write(&source, "a,b,c\n").unwrap();
        let staging_dir = dir.path().join("staging");

        let first = stage(&source, &staging_dir).await.unwrap();
        let first_content = std::fs::read(&first).unwrap();
        let second = stage(&source, &staging_dir).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), first_content);
    }

    #[tokio::test]
    async fn test_stage_overwrites_stale_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("billing.csv");
        std::fs::write(&source, "fresh\n").unwrap();
        let staging_dir = dir.path().join("staging");
        std::fs::create_dir_all(&staging_dir).unwrap();
        std::fs::write(staging_dir.join("billing.csv"), "stale content that is longer\n").unwrap();

        let target = stage(&source, &staging_dir).await.unwrap();
        assert_eq!(std::fs::read_to_string(target).unwrap(), "fresh\n");
    }

    #[tokio::test]
    async fn test_stage_keeps_input_already_in_staging_dir() {
        let dir = TempDir::new().unwrap();
        let staging_dir = dir.path().join("staging");
        std::fs::create_dir_all(&staging_dir).unwrap();
        let source = staging_dir.join("billing.csv");
        std::fs::write(&source, "2023,1,1,555,1.0,1,1\n").unwrap();

        let target = stage(&source, &staging_dir).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "2023,1,1,555,1.0,1,1\n");

        // Same file reached through a different spelling of the path
        let indirect = staging_dir.join("..").join("staging").join("billing.csv");
        let target = stage(&indirect, &staging_dir).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "2023,1,1,555,1.0,1,1\n");
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let tasklet = FilePreparationTasklet::new(dir.path().join("absent.csv"), dir.path());

        let err = tasklet.execute().await.unwrap_err();
        assert!(matches!(err, BatchError::Staging(_)));
        assert!(err.to_string().contains("absent.csv"));
    }
}
