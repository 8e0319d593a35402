//! Durable Sink
//!
//! Persists one [`ApodRow`] to two destinations: an idempotent relational
//! upsert keyed by `date`, then an append to the flat CSV file that the
//! versioner later tracks. The relational write completes before the CSV
//! append; a failure of either is fatal for the run, so the lineage trail
//! can never version a file whose authoritative write failed.

use crate::config::DbConfig;
use crate::transform::{ApodRow, COLUMNS, DATE_FORMAT, TIMESTAMP_FORMAT};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Table holding one row per logical date
pub const TABLE_NAME: &str = "apod_data";

const CREATE_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS apod_data (
    id SERIAL PRIMARY KEY,
    date DATE NOT NULL,
    title TEXT,
    url TEXT,
    explanation TEXT,
    media_type VARCHAR(50),
    hdurl TEXT,
    copyright TEXT,
    service_version VARCHAR(50),
    extraction_timestamp TIMESTAMP,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(date)
)";

const UPSERT_SQL: &str = "\
INSERT INTO apod_data
    (date, title, url, explanation, media_type, hdurl, copyright,
     service_version, extraction_timestamp)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
ON CONFLICT (date) DO UPDATE SET
    title = EXCLUDED.title,
    url = EXCLUDED.url,
    explanation = EXCLUDED.explanation,
    media_type = EXCLUDED.media_type,
    hdurl = EXCLUDED.hdurl,
    copyright = EXCLUDED.copyright,
    service_version = EXCLUDED.service_version,
    extraction_timestamp = EXCLUDED.extraction_timestamp";

/// Errors raised by the sink — all fatal for the run
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Database error: {0}. Check connection settings and that Postgres is reachable.")]
    Database(#[from] sqlx::Error),

    #[error("Upsert failed for date {date}: {source}")]
    Upsert {
        date: NaiveDate,
        #[source]
        source: sqlx::Error,
    },

    #[error("CSV write failed for '{path}': {source}. Check permissions and disk space.")]
    Csv {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Relational destination for canonical rows, mockable in tests
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Idempotently create the target table
    async fn ensure_table(&self) -> Result<(), SinkError>;

    /// Insert the row, overwriting all non-key columns on a `date` conflict
    async fn upsert(&self, row: &ApodRow) -> Result<(), SinkError>;
}

/// Postgres-backed row store
pub struct PgRowStore {
    pool: PgPool,
}

impl PgRowStore {
    /// Connect with a bounded acquire timeout
    pub async fn connect(config: &DbConfig) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url())
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool, used by tests
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn ensure_table(&self) -> Result<(), SinkError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn upsert(&self, row: &ApodRow) -> Result<(), SinkError> {
        sqlx::query(UPSERT_SQL)
            .bind(row.date)
            .bind(&row.title)
            .bind(&row.url)
            .bind(&row.explanation)
            .bind(&row.media_type)
            .bind(&row.hdurl)
            .bind(&row.copyright)
            .bind(&row.service_version)
            .bind(row.extraction_timestamp)
            .execute(&self.pool)
            .await
            .map_err(|source| SinkError::Upsert {
                date: row.date,
                source,
            })?;
        Ok(())
    }
}

/// Append one row to the flat file, writing the header only on first write
///
/// The file is an append log: re-runs for an already-seen date add a new
/// line rather than rewriting history. Deduplication lives in the relational
/// store, not here.
pub fn append_csv(path: &Path, row: &ApodRow) -> Result<(), SinkError> {
    let io_err = |source| SinkError::Csv {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let write_header = !path.exists();

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;

    if write_header {
        writeln!(file, "{}", COLUMNS.join(",")).map_err(io_err)?;
    }
    writeln!(file, "{}", csv_line(row)).map_err(io_err)?;

    Ok(())
}

/// One CSV data line in canonical column order
fn csv_line(row: &ApodRow) -> String {
    [
        row.date.format(DATE_FORMAT).to_string(),
        row.title.clone(),
        row.url.clone(),
        row.explanation.clone(),
        row.media_type.clone(),
        row.hdurl.clone(),
        row.copyright.clone(),
        row.service_version.clone(),
        row.extraction_timestamp.format(TIMESTAMP_FORMAT).to_string(),
    ]
    .iter()
    .map(|field| escape_csv(field))
    .collect::<Vec<_>>()
    .join(",")
}

/// RFC 4180 quoting: wrap fields containing separators or quotes
fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Persist one row to both destinations
///
/// The relational write must complete before the CSV append; on return both
/// destinations reflect the record.
pub async fn load<S: RowStore>(store: &S, csv_path: &Path, row: &ApodRow) -> Result<(), SinkError> {
    store.ensure_table().await?;
    store.upsert(row).await?;
    info!(date = %row.date, table = TABLE_NAME, "Row upserted");

    append_csv(csv_path, row)?;
    info!(date = %row.date, path = %csv_path.display(), "Row appended to flat file");

    Ok(())
}
