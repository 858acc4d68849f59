//! Error types for waka-archiver
//!
//! One enum per failure domain: configuration, remote fetches, and the
//! persistence sink. Fetch errors against a single project's detail call
//! are the only recoverable case; everything else aborts the run.

use thiserror::Error;

/// Run configuration errors, surfaced before any network activity
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required credential missing from the process environment
    #[error("{0} must be set")]
    MissingCredential(&'static str),

    /// Target date not in yyyy-mm-dd format
    #[error("Invalid target date {0:?}: expected yyyy-mm-dd")]
    InvalidDate(String),
}

/// WakaTime API fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API returned a non-success status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body did not decode as expected JSON
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Sink errors covering both the staging write and the durable upload
#[derive(Debug, Error)]
pub enum SinkError {
    /// Failed to create or write the local staging file
    #[error("Staging error: {0}")]
    Stage(#[from] std::io::Error),

    /// Failed to serialize the aggregate document
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Failed to write the object to durable storage
    #[error("Upload error: {0}")]
    Upload(String),
}
