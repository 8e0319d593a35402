//! APOD ETL - Main entry point

use apod_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use apod_etl::config::PipelineConfig;
use apod_etl::{Cli, Commands};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Pick up a local .env for standalone execution
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Verbose flag forces debug console output; otherwise the environment
    // decides, defaulting to warnings only.
    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("apod-etl")
            .build()
    } else {
        LogConfig::from_env().unwrap_or_else(|_| {
            LogConfig::builder()
                .level(LogLevel::Warn)
                .output(LogOutput::Console)
                .log_file_prefix("apod-etl")
                .build()
        })
    };

    // The CLI still works without logging
    let _ = init_logging(&log_config);

    let config = PipelineConfig::with_overrides(cli.repo_root.clone());

    let result = match cli.command {
        Commands::Run => apod_etl::commands::run::run(config).await,
        Commands::Init => apod_etl::commands::init::run(config).await,
        Commands::Status => apod_etl::commands::status::run(config).await,
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
