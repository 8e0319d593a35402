//! Pipeline coordinator
//!
//! Runs the five stages strictly sequentially, handing each stage's output
//! to the next through the per-run [`Handoff`] channel. Stages 1-4 are
//! fail-fast: an error there means the data or its version pointer cannot be
//! trusted, so the remaining stages never execute. Stage 5 (lineage commit)
//! is best-effort: a failure is logged, counted, and the run still reports
//! success, since the next successful commit publishes the newest pointer.

use crate::extract::{ApodApi, ExtractError, RawRecord};
use crate::handoff::{Handoff, HandoffError, StageId};
use crate::lineage::{CommitOutcome, HistoryLog, LineageError};
use crate::sink::{self, RowStore, SinkError};
use crate::snapshot::{SnapshotError, SnapshotStore, VersionPointer};
use crate::transform::{transform, ApodRow, RowPayload, TransformError, TIMESTAMP_FORMAT};
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Hand-off keys, one per producing stage
const KEY_RAW: &str = "raw_apod_data";
const KEY_ROW: &str = "transformed_row";
const KEY_POINTER: &str = "pointer_path";

/// Consecutive lineage misses after which the warning escalates to an error
pub const LINEAGE_ESCALATE_AFTER: u32 = 3;

/// Fatal pipeline errors, each naming the stage that failed
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Extract stage failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Transform stage failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Hand-off between stages failed: {0}")]
    Handoff(#[from] HandoffError),

    #[error("Load stage failed: {0}")]
    Load(#[from] SinkError),

    #[error("Version stage failed: {0}")]
    Version(#[from] SnapshotError),
}

impl PipelineError {
    /// The stage this error aborts the run at
    pub fn stage(&self) -> StageId {
        match self {
            PipelineError::Extract(_) => StageId::Extract,
            PipelineError::Transform(_) => StageId::Transform,
            PipelineError::Handoff(e) => e.stage(),
            PipelineError::Load(_) => StageId::Load,
            PipelineError::Version(_) => StageId::Version,
        }
    }
}

/// How the lineage commit ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineageStatus {
    Committed,
    NoChanges,
    /// Commit failed; run still succeeded. Carries the failure reason.
    Failed(String),
}

/// Outcome of one successful run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub date: NaiveDate,
    pub pointer: VersionPointer,
    pub lineage: LineageStatus,
}

/// Five-stage pipeline over the four external seams
pub struct Pipeline<A, S, V, H> {
    api: A,
    store: S,
    snapshots: V,
    history: H,
    csv_path: PathBuf,
}

impl<A, S, V, H> Pipeline<A, S, V, H>
where
    A: ApodApi,
    S: RowStore,
    V: SnapshotStore,
    H: HistoryLog,
{
    pub fn new(api: A, store: S, snapshots: V, history: H, csv_path: impl Into<PathBuf>) -> Self {
        Self {
            api,
            store,
            snapshots,
            history,
            csv_path: csv_path.into(),
        }
    }

    /// Execute one run end to end
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let run_id = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let mut handoff = Handoff::new(run_id.clone());
        info!(run_id, "Pipeline run started");

        // Stage 1: extract
        let raw = self.api.fetch_daily().await?;
        handoff.push(StageId::Extract, KEY_RAW, &raw)?;

        // Stage 2: transform and validate
        let raw: RawRecord = handoff.pull(StageId::Extract, KEY_RAW)?;
        let row = transform(&raw, Local::now().naive_local())?;
        handoff.push(StageId::Transform, KEY_ROW, &row.to_payload())?;

        // Stage 3: persist to both destinations
        let payload: RowPayload = handoff.pull(StageId::Transform, KEY_ROW)?;
        let row = ApodRow::from_payload(&payload)?;
        sink::load(&self.store, &self.csv_path, &row).await?;

        // Stage 4: version the flat file
        let pointer = self.snapshots.register(&self.csv_path).await?;
        handoff.push(
            StageId::Version,
            KEY_POINTER,
            &pointer.pointer_path.to_string_lossy(),
        )?;

        // Stage 5: record lineage, best-effort
        let pointer_path: String = handoff.pull(StageId::Version, KEY_POINTER)?;
        let lineage = self.record_lineage(Path::new(&pointer_path)).await;

        info!(run_id, date = %row.date, "Pipeline run finished");
        Ok(RunReport {
            run_id,
            date: row.date,
            pointer,
            lineage,
        })
    }

    async fn record_lineage(&self, pointer_path: &Path) -> LineageStatus {
        let file_name = self
            .csv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "apod_data.csv".to_string());
        let message = format!(
            "Add data version pointer for {} - {}",
            file_name,
            Local::now().format(TIMESTAMP_FORMAT)
        );

        match self.history.commit(pointer_path, &message).await {
            Ok(CommitOutcome::Committed) => {
                clear_lineage_lag(&self.csv_path);
                LineageStatus::Committed
            }
            Ok(CommitOutcome::NoChanges) => {
                clear_lineage_lag(&self.csv_path);
                LineageStatus::NoChanges
            }
            Err(err) => {
                let misses = record_lineage_miss(&self.csv_path);
                report_lineage_miss(&err, misses);
                LineageStatus::Failed(err.to_string())
            }
        }
    }
}

fn report_lineage_miss(err: &LineageError, misses: u32) {
    if misses >= LINEAGE_ESCALATE_AFTER {
        error!(
            error = %err,
            consecutive_misses = misses,
            "Lineage commit failed repeatedly; audit trail is lagging behind the data store"
        );
    } else {
        warn!(
            error = %err,
            consecutive_misses = misses,
            "Lineage commit failed; will retry on the next scheduled run"
        );
    }
}

fn lag_path(csv_path: &Path) -> PathBuf {
    csv_path.with_extension("lineage-lag")
}

/// Number of consecutive runs whose lineage commit failed
pub fn lineage_lag(csv_path: &Path) -> u32 {
    std::fs::read_to_string(lag_path(csv_path))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

fn record_lineage_miss(csv_path: &Path) -> u32 {
    let misses = lineage_lag(csv_path) + 1;
    // Counter write is advisory; failure to persist it must not fail the run
    if let Err(err) = std::fs::write(lag_path(csv_path), misses.to_string()) {
        warn!(error = %err, "Could not persist lineage lag counter");
    }
    misses
}

fn clear_lineage_lag(csv_path: &Path) {
    let path = lag_path(csv_path);
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}
