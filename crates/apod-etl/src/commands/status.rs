//! `apod-etl status` command implementation
//!
//! Prints the version-control and history-log status for the repository
//! root, plus how far the lineage trail lags behind the data store.

use crate::config::PipelineConfig;
use crate::lineage::{GitCli, HistoryLog};
use crate::pipeline;
use crate::snapshot::{DvcCli, SnapshotStore};
use anyhow::{Context, Result};

/// Show repository status
pub async fn run(config: PipelineConfig) -> Result<()> {
    let snapshots = DvcCli::new(&config.repo_root, config.tool_timeout());
    let history = GitCli::new(&config.repo_root, config.tool_timeout());

    println!("Flat file: {}", config.csv_path.display());

    let lag = pipeline::lineage_lag(&config.csv_path);
    if lag == 0 {
        println!("Lineage:   up to date");
    } else {
        println!("Lineage:   lagging by {lag} run(s)");
    }

    let dvc_status = snapshots.status().await.context("dvc status failed")?;
    println!();
    println!("DVC status:");
    print_indented(&dvc_status);

    let git_status = history.status().await.context("git status failed")?;
    println!("Git status:");
    print_indented(&git_status);

    Ok(())
}

fn print_indented(text: &str) {
    if text.trim().is_empty() {
        println!("  (clean)");
        return;
    }
    for line in text.lines() {
        println!("  {line}");
    }
}
