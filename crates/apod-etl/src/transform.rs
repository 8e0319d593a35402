//! Record Transformer
//!
//! Maps a [`RawRecord`] into the fixed-schema [`ApodRow`], stamping the
//! provenance timestamp and validating required fields. The transformer is a
//! hard gate: no partially-valid row reaches the sink.

use crate::extract::RawRecord;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// String encoding for calendar dates crossing the hand-off channel
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// String encoding for timestamps crossing the hand-off channel
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonical column order of the tabular record
pub const COLUMNS: [&str; 9] = [
    "date",
    "title",
    "url",
    "explanation",
    "media_type",
    "hdurl",
    "copyright",
    "service_version",
    "extraction_timestamp",
];

/// Fields that must be present and non-empty for a row to be accepted
pub const REQUIRED_FIELDS: [&str; 4] = ["date", "title", "url", "explanation"];

/// Canonical tabular record for one logical day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApodRow {
    /// Unique key across the relational table and the flat file
    pub date: NaiveDate,
    pub title: String,
    pub url: String,
    pub explanation: String,
    pub media_type: String,
    pub hdurl: String,
    pub copyright: String,
    pub service_version: String,
    /// Stamped at transform time, never copied from the source
    pub extraction_timestamp: NaiveDateTime,
}

/// Errors raised while transforming or reconstructing a row — all fatal
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Required field '{0}' is missing or empty")]
    MissingField(&'static str),

    #[error("Cannot parse date '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Cannot parse timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Hand-off payload is missing column '{0}'")]
    MissingColumn(String),

    #[error("Hand-off payload column count ({columns}) does not match value count ({values})")]
    ColumnMismatch { columns: usize, values: usize },
}

/// Row as it crosses the hand-off channel: all values string-encoded, with
/// the column order carried explicitly alongside the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowPayload {
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

/// Map a raw record into the canonical row
///
/// Optional fields default to the empty string so the row schema stays
/// fixed-width. `extracted_at` is the caller's current time; it is stamped
/// fresh on every invocation, including redeliveries of the same record.
pub fn transform(raw: &RawRecord, extracted_at: NaiveDateTime) -> Result<ApodRow, TransformError> {
    let field = |key: &str| raw.get_str(key).unwrap_or("").to_string();

    let row = ApodRow {
        date: parse_date(&field("date"))?,
        title: field("title"),
        url: field("url"),
        explanation: field("explanation"),
        media_type: field("media_type"),
        hdurl: field("hdurl"),
        copyright: field("copyright"),
        service_version: field("service_version"),
        extraction_timestamp: extracted_at,
    };

    validate(&row)?;
    Ok(row)
}

/// Reject rows with missing required fields
pub fn validate(row: &ApodRow) -> Result<(), TransformError> {
    if row.title.is_empty() {
        return Err(TransformError::MissingField("title"));
    }
    if row.url.is_empty() {
        return Err(TransformError::MissingField("url"));
    }
    if row.explanation.is_empty() {
        return Err(TransformError::MissingField("explanation"));
    }
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate, TransformError> {
    if value.is_empty() {
        return Err(TransformError::MissingField("date"));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| TransformError::InvalidDate {
        value: value.to_string(),
        source,
    })
}

impl ApodRow {
    /// Encode the row for the hand-off channel
    ///
    /// Values are emitted in [`COLUMNS`] order with all date/time fields
    /// serialized to their fixed string formats.
    pub fn to_payload(&self) -> RowPayload {
        RowPayload {
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            values: vec![
                self.date.format(DATE_FORMAT).to_string(),
                self.title.clone(),
                self.url.clone(),
                self.explanation.clone(),
                self.media_type.clone(),
                self.hdurl.clone(),
                self.copyright.clone(),
                self.service_version.clone(),
                self.extraction_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            ],
        }
    }

    /// Reconstruct a row from a hand-off payload
    ///
    /// Field positions come from the carried column list, so reconstruction
    /// is deterministic regardless of how the payload was produced.
    pub fn from_payload(payload: &RowPayload) -> Result<Self, TransformError> {
        if payload.columns.len() != payload.values.len() {
            return Err(TransformError::ColumnMismatch {
                columns: payload.columns.len(),
                values: payload.values.len(),
            });
        }

        let lookup = |name: &str| -> Result<&str, TransformError> {
            payload
                .columns
                .iter()
                .position(|c| c == name)
                .map(|i| payload.values[i].as_str())
                .ok_or_else(|| TransformError::MissingColumn(name.to_string()))
        };

        let timestamp_value = lookup("extraction_timestamp")?;
        let extraction_timestamp = NaiveDateTime::parse_from_str(timestamp_value, TIMESTAMP_FORMAT)
            .map_err(|source| TransformError::InvalidTimestamp {
                value: timestamp_value.to_string(),
                source,
            })?;

        let row = ApodRow {
            date: parse_date(lookup("date")?)?,
            title: lookup("title")?.to_string(),
            url: lookup("url")?.to_string(),
            explanation: lookup("explanation")?.to_string(),
            media_type: lookup("media_type")?.to_string(),
            hdurl: lookup("hdurl")?.to_string(),
            copyright: lookup("copyright")?.to_string(),
            service_version: lookup("service_version")?.to_string(),
            extraction_timestamp,
        };

        validate(&row)?;
        Ok(row)
    }
}
