//! Snapshot Versioner
//!
//! Registers the current bytes of the flat file with the content-addressed
//! version-control tool (DVC), producing the pointer artifact committed by
//! the lineage recorder. The hashing and object-store write belong to the
//! tool; this component invokes it correctly and surfaces the pointer.

use crate::paths;
use crate::process::{self, ToolError};
use apod_common::checksum::{digest_file, FileDigest};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Pointer artifact for one tracked file
///
/// One pointer exists per tracked file; re-versioning overwrites it in
/// place. The digest describes the tracked file at registration time.
#[derive(Debug, Clone)]
pub struct VersionPointer {
    /// Path of the `<file>.dvc` pointer artifact
    pub pointer_path: PathBuf,
    /// Size and SHA-256 of the tracked flat file
    pub tracked: FileDigest,
}

/// Errors raised while versioning — all fatal for the run
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Cannot version '{0}': file not found. The load stage must complete first.")]
    FileNotFound(PathBuf),

    #[error("Cannot digest tracked file: {0}")]
    Digest(#[from] apod_common::CommonError),
}

/// Content-addressed snapshot backend, mockable in tests
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Idempotently initialize the version-control metadata directory
    async fn ensure_initialized(&self) -> Result<(), SnapshotError>;

    /// Register the file's current content, producing/refreshing its pointer
    async fn register(&self, file: &Path) -> Result<VersionPointer, SnapshotError>;

    /// Human-readable tool status for the repository
    async fn status(&self) -> Result<String, SnapshotError>;
}

/// DVC-backed snapshot store
pub struct DvcCli {
    repo_root: PathBuf,
    timeout: Duration,
}

impl DvcCli {
    pub fn new(repo_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_root: repo_root.into(),
            timeout,
        }
    }

    fn metadata_dir(&self) -> PathBuf {
        self.repo_root.join(".dvc")
    }
}

#[async_trait]
impl SnapshotStore for DvcCli {
    async fn ensure_initialized(&self) -> Result<(), SnapshotError> {
        if self.metadata_dir().is_dir() {
            debug!(root = %self.repo_root.display(), "DVC already initialized");
            return Ok(());
        }

        process::run_checked(&self.repo_root, "dvc", &["init", "--no-scm"], self.timeout).await?;
        info!(root = %self.repo_root.display(), "Initialized DVC repository");
        Ok(())
    }

    async fn register(&self, file: &Path) -> Result<VersionPointer, SnapshotError> {
        self.ensure_initialized().await?;

        let (absolute, relative) = paths::resolve(&self.repo_root, file);
        if !absolute.exists() {
            return Err(SnapshotError::FileNotFound(absolute));
        }

        let relative_str = relative.to_string_lossy();
        process::run_checked(&self.repo_root, "dvc", &["add", &relative_str], self.timeout)
            .await?;

        // DVC writes the pointer next to the tracked file
        let file_name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pointer_path = absolute.with_file_name(format!("{file_name}.dvc"));

        let tracked = digest_file(&absolute)?;
        info!(
            pointer = %pointer_path.display(),
            digest = %tracked,
            "Registered snapshot"
        );

        Ok(VersionPointer {
            pointer_path,
            tracked,
        })
    }

    async fn status(&self) -> Result<String, SnapshotError> {
        let run =
            process::run_unchecked(&self.repo_root, "dvc", &["status"], self.timeout).await?;
        Ok(run.stdout)
    }
}
