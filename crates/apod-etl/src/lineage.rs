//! Lineage Recorder
//!
//! Commits the version pointer into the git history log. Unlike every prior
//! stage this one is best-effort: the pipeline logs a failed commit and
//! still reports the run successful, because the data and its pointer are
//! already durable and the next run publishes the newest pointer anyway.
//!
//! "Nothing to commit" is detected from the exit status of
//! `git diff --cached --quiet` rather than by matching substrings in tool
//! output.

use crate::paths;
use crate::process::{self, ToolError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Committer identity applied when the repository has none configured
pub const COMMITTER_NAME: &str = "apod-etl";
pub const COMMITTER_EMAIL: &str = "apod-etl@example.com";

/// Result of a commit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit was created
    Committed,
    /// The pointer content was unchanged since the last run; benign no-op
    NoChanges,
}

/// Errors raised by the history log
#[derive(Error, Debug)]
pub enum LineageError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Cannot commit '{0}': file not found")]
    PointerMissing(PathBuf),

    #[error("Unexpected exit code {code:?} from staged-change check")]
    StagedCheck { code: Option<i32> },
}

/// Append-only source-history log, mockable in tests
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Idempotently initialize the log, including a committer identity
    async fn ensure_initialized(&self) -> Result<(), LineageError>;

    /// Stage the file and commit it with the given message
    async fn commit(&self, file: &Path, message: &str) -> Result<CommitOutcome, LineageError>;

    /// Human-readable log status for the repository
    async fn status(&self) -> Result<String, LineageError>;
}

/// Git-backed history log
pub struct GitCli {
    repo_root: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_root: repo_root.into(),
            timeout,
        }
    }

    async fn git(&self, args: &[&str]) -> Result<process::ToolRun, ToolError> {
        process::run_checked(&self.repo_root, "git", args, self.timeout).await
    }
}

#[async_trait]
impl HistoryLog for GitCli {
    async fn ensure_initialized(&self) -> Result<(), LineageError> {
        if self.repo_root.join(".git").is_dir() {
            debug!(root = %self.repo_root.display(), "Git already initialized");
            return Ok(());
        }

        self.git(&["init"]).await?;
        // Repo-local identity so commits work in unconfigured environments
        self.git(&["config", "user.email", COMMITTER_EMAIL]).await?;
        self.git(&["config", "user.name", COMMITTER_NAME]).await?;
        info!(root = %self.repo_root.display(), "Initialized git repository");
        Ok(())
    }

    async fn commit(&self, file: &Path, message: &str) -> Result<CommitOutcome, LineageError> {
        self.ensure_initialized().await?;

        let (absolute, relative) = paths::resolve(&self.repo_root, file);
        if !absolute.exists() {
            return Err(LineageError::PointerMissing(absolute));
        }

        let relative_str = relative.to_string_lossy();
        self.git(&["add", &relative_str]).await?;

        // Exit 0: nothing staged; exit 1: staged changes present
        let staged = process::run_unchecked(
            &self.repo_root,
            "git",
            &["diff", "--cached", "--quiet"],
            self.timeout,
        )
        .await?;

        match staged.code {
            Some(0) => {
                debug!(file = %relative_str, "No pointer changes to commit");
                Ok(CommitOutcome::NoChanges)
            }
            Some(1) => {
                self.git(&["commit", "-m", message]).await?;
                info!(file = %relative_str, message, "Committed pointer to history log");
                Ok(CommitOutcome::Committed)
            }
            code => Err(LineageError::StagedCheck { code }),
        }
    }

    async fn status(&self) -> Result<String, LineageError> {
        let run =
            process::run_unchecked(&self.repo_root, "git", &["status"], self.timeout).await?;
        Ok(run.stdout)
    }
}
