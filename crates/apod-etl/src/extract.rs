//! Record Extractor
//!
//! Issues one request per run against the APOD endpoint and returns the raw
//! key/value record. Any network, timeout or non-2xx failure is fatal for
//! the run; no downstream stage executes without a raw record.

use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

/// Untyped record as returned by the remote API for one logical day
///
/// Exists only between the extract and transform stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

impl RawRecord {
    /// String value for a key, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Errors raised during extraction — all fatal for the run
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("APOD request failed: {0}. Check network connectivity and the API endpoint.")]
    Http(#[from] reqwest::Error),

    #[error("APOD response was not a JSON object")]
    NotAnObject,
}

/// Source of daily records, mockable in tests
#[async_trait]
pub trait ApodApi: Send + Sync {
    async fn fetch_daily(&self) -> Result<RawRecord, ExtractError>;
}

/// HTTP client for the APOD endpoint
pub struct ApodClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ApodClient {
    /// Build a client with the configured request timeout
    pub fn new(config: &ApiConfig) -> Result<Self, ExtractError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ApodApi for ApodClient {
    async fn fetch_daily(&self) -> Result<RawRecord, ExtractError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let record = match body {
            Value::Object(map) => RawRecord(map),
            _ => return Err(ExtractError::NotAnObject),
        };

        info!(
            date = record.get_str("date").unwrap_or("<missing>"),
            "Extracted APOD record"
        );
        Ok(record)
    }
}
