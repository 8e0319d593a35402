//! APOD ETL Common Library
//!
//! Shared utilities for the APOD ETL workspace:
//!
//! - **Error Handling**: the common error and result types
//! - **Logging**: tracing subscriber setup shared by every binary
//! - **Checksums**: streaming file digests used to describe versioned files

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
