//! End-to-end pipeline flow tests over mocked external seams
//!
//! The API, relational store, snapshot tool and history log are replaced
//! with in-memory fakes; the flat file and hand-off channel are real. These
//! tests pin the failure-triage contract: stages 1-4 abort the run and stop
//! all downstream stages, stage 5 never fails the run.

use apod_etl::extract::{ApodApi, ExtractError, RawRecord};
use apod_etl::handoff::StageId;
use apod_etl::lineage::{CommitOutcome, HistoryLog, LineageError};
use apod_etl::pipeline::{lineage_lag, LineageStatus, Pipeline};
use apod_etl::sink::{RowStore, SinkError};
use apod_etl::snapshot::{SnapshotError, SnapshotStore, VersionPointer};
use apod_etl::transform::{ApodRow, COLUMNS};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Recorded {
    upserts: Arc<Mutex<Vec<NaiveDate>>>,
    registers: Arc<Mutex<Vec<PathBuf>>>,
    commits: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

struct FakeApi {
    body: Option<serde_json::Value>,
}

impl FakeApi {
    fn returning(body: serde_json::Value) -> Self {
        Self { body: Some(body) }
    }

    fn failing() -> Self {
        Self { body: None }
    }
}

#[async_trait]
impl ApodApi for FakeApi {
    async fn fetch_daily(&self) -> Result<RawRecord, ExtractError> {
        match &self.body {
            Some(serde_json::Value::Object(map)) => Ok(RawRecord(map.clone())),
            Some(_) | None => Err(ExtractError::NotAnObject),
        }
    }
}

struct FakeStore {
    recorded: Recorded,
    fail: bool,
}

#[async_trait]
impl RowStore for FakeStore {
    async fn ensure_table(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn upsert(&self, row: &ApodRow) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Csv {
                path: PathBuf::from("fake"),
                source: std::io::Error::other("store down"),
            });
        }
        self.recorded.upserts.lock().unwrap().push(row.date);
        Ok(())
    }
}

struct FakeSnapshots {
    recorded: Recorded,
    fail: bool,
}

#[async_trait]
impl SnapshotStore for FakeSnapshots {
    async fn ensure_initialized(&self) -> Result<(), SnapshotError> {
        Ok(())
    }

    async fn register(&self, file: &Path) -> Result<VersionPointer, SnapshotError> {
        if self.fail {
            return Err(SnapshotError::FileNotFound(file.to_path_buf()));
        }
        self.recorded.registers.lock().unwrap().push(file.to_path_buf());

        let tracked = apod_common::checksum::digest_file(file)?;
        let name = file.file_name().unwrap().to_string_lossy();
        Ok(VersionPointer {
            pointer_path: file.with_file_name(format!("{name}.dvc")),
            tracked,
        })
    }

    async fn status(&self) -> Result<String, SnapshotError> {
        Ok(String::new())
    }
}

struct FakeHistory {
    recorded: Recorded,
    fail: bool,
    outcome: CommitOutcome,
}

#[async_trait]
impl HistoryLog for FakeHistory {
    async fn ensure_initialized(&self) -> Result<(), LineageError> {
        Ok(())
    }

    async fn commit(&self, file: &Path, message: &str) -> Result<CommitOutcome, LineageError> {
        if self.fail {
            return Err(LineageError::PointerMissing(file.to_path_buf()));
        }
        self.recorded
            .commits
            .lock()
            .unwrap()
            .push((file.to_path_buf(), message.to_string()));
        Ok(self.outcome)
    }

    async fn status(&self) -> Result<String, LineageError> {
        Ok(String::new())
    }
}

fn full_record(date: &str) -> serde_json::Value {
    serde_json::json!({
        "date": date,
        "title": "Pillars of Creation",
        "url": "https://x/img.jpg",
        "explanation": "Columns of interstellar gas.",
        "media_type": "image"
    })
}

struct Harness {
    recorded: Recorded,
    csv: PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            recorded: Recorded::default(),
            csv: dir.path().join("data").join("apod_data.csv"),
            _dir: dir,
        }
    }

    fn pipeline(
        &self,
        api: FakeApi,
        store_fails: bool,
        snapshots_fail: bool,
        history_fails: bool,
    ) -> Pipeline<FakeApi, FakeStore, FakeSnapshots, FakeHistory> {
        Pipeline::new(
            api,
            FakeStore {
                recorded: self.recorded.clone(),
                fail: store_fails,
            },
            FakeSnapshots {
                recorded: self.recorded.clone(),
                fail: snapshots_fail,
            },
            FakeHistory {
                recorded: self.recorded.clone(),
                fail: history_fails,
                outcome: CommitOutcome::Committed,
            },
            self.csv.clone(),
        )
    }
}

#[tokio::test]
async fn successful_run_persists_versions_and_commits() {
    let h = Harness::new();
    let pipeline = h.pipeline(FakeApi::returning(full_record("2024-05-01")), false, false, false);

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(report.lineage, LineageStatus::Committed);
    assert!(report.pointer.pointer_path.ends_with("apod_data.csv.dvc"));

    let contents = std::fs::read_to_string(&h.csv).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], COLUMNS.join(","));
    assert!(lines[1].starts_with("2024-05-01,Pillars of Creation,"));

    assert_eq!(h.recorded.upserts.lock().unwrap().len(), 1);
    assert_eq!(h.recorded.registers.lock().unwrap().len(), 1);

    let commits = h.recorded.commits.lock().unwrap();
    assert_eq!(commits.len(), 1);
    assert!(commits[0].1.starts_with("Add data version pointer for apod_data.csv"));
}

#[tokio::test]
async fn repeated_runs_append_without_repeating_header() {
    let h = Harness::new();
    for date in ["2024-05-01", "2024-05-02", "2024-05-03"] {
        let pipeline = h.pipeline(FakeApi::returning(full_record(date)), false, false, false);
        pipeline.run().await.unwrap();
    }

    let contents = std::fs::read_to_string(&h.csv).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], COLUMNS.join(","));

    let dates: Vec<&str> = lines[1..]
        .iter()
        .map(|l| l.split(',').next().unwrap())
        .collect();
    assert_eq!(dates, vec!["2024-05-01", "2024-05-02", "2024-05-03"]);
}

#[tokio::test]
async fn extraction_failure_stops_all_downstream_stages() {
    let h = Harness::new();
    let pipeline = h.pipeline(FakeApi::failing(), false, false, false);

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.stage(), StageId::Extract);

    assert!(h.recorded.upserts.lock().unwrap().is_empty());
    assert!(h.recorded.registers.lock().unwrap().is_empty());
    assert!(h.recorded.commits.lock().unwrap().is_empty());
    assert!(!h.csv.exists());
}

#[tokio::test]
async fn validation_gate_blocks_sink_and_versioner() {
    let h = Harness::new();
    let record = serde_json::json!({
        "date": "2024-05-01",
        "url": "https://x/img.jpg",
        "explanation": "E"
    });
    let pipeline = h.pipeline(FakeApi::returning(record), false, false, false);

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.stage(), StageId::Transform);

    assert!(h.recorded.upserts.lock().unwrap().is_empty());
    assert!(h.recorded.registers.lock().unwrap().is_empty());
    assert!(h.recorded.commits.lock().unwrap().is_empty());
    assert!(!h.csv.exists());
}

#[tokio::test]
async fn store_failure_stops_before_versioning() {
    let h = Harness::new();
    let pipeline = h.pipeline(FakeApi::returning(full_record("2024-05-01")), true, false, false);

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.stage(), StageId::Load);

    // The CSV append runs after the relational write, so nothing was written
    assert!(!h.csv.exists());
    assert!(h.recorded.registers.lock().unwrap().is_empty());
    assert!(h.recorded.commits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn versioner_failure_prevents_lineage_commit() {
    let h = Harness::new();
    let pipeline = h.pipeline(FakeApi::returning(full_record("2024-05-01")), false, true, false);

    let err = pipeline.run().await.unwrap_err();
    assert_eq!(err.stage(), StageId::Version);

    // The sink completed; only the lineage commit was blocked
    assert_eq!(h.recorded.upserts.lock().unwrap().len(), 1);
    assert!(h.csv.exists());
    assert!(h.recorded.commits.lock().unwrap().is_empty());
}

#[tokio::test]
async fn lineage_failure_does_not_fail_the_run() {
    let h = Harness::new();
    let pipeline = h.pipeline(FakeApi::returning(full_record("2024-05-01")), false, false, true);

    let report = pipeline.run().await.unwrap();
    assert!(matches!(report.lineage, LineageStatus::Failed(_)));

    // Sink and versioner results are intact
    assert_eq!(h.recorded.upserts.lock().unwrap().len(), 1);
    assert_eq!(h.recorded.registers.lock().unwrap().len(), 1);
    assert!(h.csv.exists());
    assert_eq!(lineage_lag(&h.csv), 1);
}

#[tokio::test]
async fn consecutive_lineage_misses_accumulate_then_heal() {
    let h = Harness::new();
    for expected_lag in 1..=3 {
        let pipeline =
            h.pipeline(FakeApi::returning(full_record("2024-05-01")), false, false, true);
        pipeline.run().await.unwrap();
        assert_eq!(lineage_lag(&h.csv), expected_lag);
    }

    // A successful commit resets the counter
    let pipeline = h.pipeline(FakeApi::returning(full_record("2024-05-01")), false, false, false);
    let report = pipeline.run().await.unwrap();
    assert_eq!(report.lineage, LineageStatus::Committed);
    assert_eq!(lineage_lag(&h.csv), 0);
}

#[tokio::test]
async fn unchanged_pointer_is_benign() {
    let h = Harness::new();
    let pipeline = Pipeline::new(
        FakeApi::returning(full_record("2024-05-01")),
        FakeStore {
            recorded: h.recorded.clone(),
            fail: false,
        },
        FakeSnapshots {
            recorded: h.recorded.clone(),
            fail: false,
        },
        FakeHistory {
            recorded: h.recorded.clone(),
            fail: false,
            outcome: CommitOutcome::NoChanges,
        },
        h.csv.clone(),
    );

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.lineage, LineageStatus::NoChanges);
    assert_eq!(lineage_lag(&h.csv), 0);
}
