//! `apod-etl init` command implementation
//!
//! Idempotently initializes the DVC metadata directory and the git history
//! log at the repository root. Safe to run repeatedly.

use crate::config::PipelineConfig;
use crate::lineage::{GitCli, HistoryLog};
use crate::snapshot::{DvcCli, SnapshotStore};
use anyhow::{Context, Result};

/// Initialize both version-control repositories
pub async fn run(config: PipelineConfig) -> Result<()> {
    let snapshots = DvcCli::new(&config.repo_root, config.tool_timeout());
    let history = GitCli::new(&config.repo_root, config.tool_timeout());

    snapshots
        .ensure_initialized()
        .await
        .context("Failed to initialize DVC")?;
    history
        .ensure_initialized()
        .await
        .context("Failed to initialize the git history log")?;

    println!("✓ Repository ready at {}", config.repo_root.display());
    println!("  DVC metadata: {}", config.repo_root.join(".dvc").display());
    println!("  History log:  {}", config.repo_root.join(".git").display());

    Ok(())
}
