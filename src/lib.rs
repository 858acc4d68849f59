//! # waka-archiver library interface
//!
//! Daily batch job that downloads one day of WakaTime activity, enriches
//! the summary with per-project detail breakdowns, and archives the
//! aggregate document to object storage.
//!
//! Exposed as a library so the pipeline can be exercised by integration
//! tests with fake collaborators.

pub mod document;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod sink;

pub use document::AggregateDocument;
pub use error::{ConfigError, FetchError, SinkError};
pub use pipeline::{RunOutcome, RunParameters};
