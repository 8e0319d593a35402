//! Bounded subprocess invocation for the version-control tools
//!
//! Both the snapshot versioner and the lineage recorder shell out to external
//! tools. Every invocation runs in the repository root and is bounded by an
//! explicit timeout; there is no mid-invocation cancellation beyond killing
//! the child on timeout.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a tool invocation
#[derive(Debug)]
pub struct ToolRun {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolRun {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Errors raised while invoking an external tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to run '{tool}': {source}. Is the tool installed and on PATH?")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("'{tool}' failed (exit code {code:?}): {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Run a tool and capture its output, without judging the exit code
///
/// Callers that care about the exit status inspect [`ToolRun::code`]; use
/// [`run_checked`] when any non-zero exit is an error.
pub async fn run_unchecked(
    cwd: &Path,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<ToolRun, ToolError> {
    let tool = display_name(program, args);
    debug!(tool = %tool, cwd = %cwd.display(), "Running tool");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, output)
        .await
        .map_err(|_| ToolError::Timeout {
            tool: tool.clone(),
            secs: timeout.as_secs(),
        })?
        .map_err(|source| ToolError::Spawn { tool, source })?;

    Ok(ToolRun {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a tool, treating any non-zero exit as an error
pub async fn run_checked(
    cwd: &Path,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<ToolRun, ToolError> {
    let run = run_unchecked(cwd, program, args, timeout).await?;
    if run.success() {
        Ok(run)
    } else {
        Err(ToolError::Failed {
            tool: display_name(program, args),
            code: run.code,
            stderr: run.stderr.trim().to_string(),
        })
    }
}

fn display_name(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
