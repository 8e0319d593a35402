//! APOD ETL Library
//!
//! Five-stage daily pipeline for astronomy-picture metadata:
//!
//! 1. **Extract** — fetch the day's record from the APOD API
//! 2. **Transform** — normalize into the fixed-schema tabular row
//! 3. **Load** — idempotent Postgres upsert plus flat-file append
//! 4. **Version** — register the flat file with DVC, refreshing its pointer
//! 5. **Commit** — record the pointer in the git history log (best-effort)
//!
//! Stages communicate through a per-run hand-off channel of JSON-safe
//! values; stages 1-4 fail fast, stage 5 never fails the run. The external
//! scheduler serializes runs and owns task-level retry policy.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;
pub mod config;
pub mod extract;
pub mod handoff;
pub mod lineage;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod sink;
pub mod snapshot;
pub mod transform;

// Re-export commonly used types
pub use pipeline::{LineageStatus, Pipeline, PipelineError, RunReport};
pub use transform::ApodRow;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// APOD ETL - daily astronomy-picture ingestion with versioned lineage
#[derive(Parser, Debug)]
#[command(name = "apod-etl")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository root holding the flat file, DVC metadata and git log
    #[arg(long, global = true)]
    pub repo_root: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one pipeline run (the scheduler invokes this per tick)
    Run,

    /// Initialize the version-control and history repositories
    Init,

    /// Show version-control, history-log and lineage-lag status
    Status,
}
