//! Inter-stage hand-off channel
//!
//! Each pipeline run owns one [`Handoff`]. A stage publishes its output under
//! `(producing stage, key)` and the next stage pulls it back out. Values are
//! restricted to JSON-safe types, which is why date and time fields are
//! string-encoded before they cross a stage boundary.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// The five pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    Extract,
    Transform,
    Load,
    Version,
    Commit,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Extract => "extract",
            StageId::Transform => "transform",
            StageId::Load => "load",
            StageId::Version => "version",
            StageId::Commit => "commit",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the hand-off channel
#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("No value for key '{key}' produced by stage '{stage}'")]
    Missing { stage: StageId, key: String },

    #[error("Value for key '{key}' from stage '{stage}' is not representable: {source}")]
    Codec {
        stage: StageId,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HandoffError {
    /// The producing stage the failed hand-off belongs to
    pub fn stage(&self) -> StageId {
        match self {
            HandoffError::Missing { stage, .. } | HandoffError::Codec { stage, .. } => *stage,
        }
    }
}

/// Per-run key/value store carrying stage outputs
#[derive(Debug)]
pub struct Handoff {
    run_id: String,
    values: HashMap<(StageId, String), Value>,
}

impl Handoff {
    /// Create the channel for a single run
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            values: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Publish a stage output
    ///
    /// A second push under the same `(stage, key)` replaces the value; each
    /// stage produces one logical value per run.
    pub fn push<T: Serialize>(
        &mut self,
        stage: StageId,
        key: &str,
        value: &T,
    ) -> Result<(), HandoffError> {
        let value = serde_json::to_value(value).map_err(|source| HandoffError::Codec {
            stage,
            key: key.to_string(),
            source,
        })?;
        self.values.insert((stage, key.to_string()), value);
        Ok(())
    }

    /// Retrieve a stage output published earlier in the same run
    pub fn pull<T: DeserializeOwned>(&self, stage: StageId, key: &str) -> Result<T, HandoffError> {
        let value = self
            .values
            .get(&(stage, key.to_string()))
            .ok_or_else(|| HandoffError::Missing {
                stage,
                key: key.to_string(),
            })?;
        serde_json::from_value(value.clone()).map_err(|source| HandoffError::Codec {
            stage,
            key: key.to_string(),
            source,
        })
    }
}
