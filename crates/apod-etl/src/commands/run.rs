//! `apod-etl run` command implementation
//!
//! Executes one pipeline run end to end. A fatal stage error aborts with
//! context naming the stage; a lineage miss is reported but does not fail
//! the command.

use crate::config::PipelineConfig;
use crate::extract::ApodClient;
use crate::lineage::GitCli;
use crate::pipeline::{LineageStatus, Pipeline};
use crate::sink::PgRowStore;
use crate::snapshot::DvcCli;
use anyhow::{Context, Result};

/// Execute one pipeline run
pub async fn run(config: PipelineConfig) -> Result<()> {
    let api = ApodClient::new(&config.api).context("Failed to build the APOD client")?;
    let store = PgRowStore::connect(&config.db)
        .await
        .context("Failed to connect to Postgres")?;
    let snapshots = DvcCli::new(&config.repo_root, config.tool_timeout());
    let history = GitCli::new(&config.repo_root, config.tool_timeout());

    let pipeline = Pipeline::new(api, store, snapshots, history, config.csv_path.clone());

    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(err) => {
            let stage = err.stage();
            return Err(anyhow::Error::new(err)
                .context(format!("Run aborted at stage '{stage}'")));
        }
    };

    println!("✓ Pipeline run {} complete", report.run_id);
    println!("  Date:    {}", report.date);
    println!("  Pointer: {}", report.pointer.pointer_path.display());
    println!("  Tracked: {}", report.pointer.tracked);
    match report.lineage {
        LineageStatus::Committed => println!("  Lineage: committed"),
        LineageStatus::NoChanges => println!("  Lineage: unchanged (nothing to commit)"),
        LineageStatus::Failed(reason) => {
            println!("  Lineage: NOT recorded ({reason})");
            println!("           The data load succeeded; the commit retries next run.");
        }
    }

    Ok(())
}
