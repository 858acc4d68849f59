//! Run orchestration
//!
//! Drives one fetch-aggregate-persist run: summary fetch, sequential
//! per-project detail fan-out, document assembly, staging, upload.
//!
//! Failure policy: summary fetch and both sink steps are fatal; a single
//! project's detail failure is logged with full context and that project
//! is skipped, so one bad project never prevents shipping the day's
//! summary. Skips are also recorded on the outcome.

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use crate::document::{AggregateDocument, DATE_FORMAT};
use crate::error::{ConfigError, FetchError, SinkError};
use crate::services::ActivityFetcher;
use crate::sink::{ObjectStore, Sink};
use std::path::PathBuf;

/// Immutable parameters for one run
#[derive(Debug, Clone)]
pub struct RunParameters {
    pub target_date: NaiveDate,
    pub user_id: String,
}

/// Fatal pipeline failure
#[derive(Debug, Error)]
pub enum RunError {
    /// Summary fetch failed; there is nothing to enrich
    #[error("Summary fetch failed: {0}")]
    Summary(#[from] FetchError),

    /// Staging or upload failed; the document was never delivered
    #[error(transparent)]
    Persistence(#[from] SinkError),
}

/// Terminal state of a successful run
#[derive(Debug)]
pub enum RunOutcome {
    /// Summary listed no projects; nothing to report, nothing written
    NothingToReport,

    /// Document assembled and delivered
    Uploaded {
        /// Key the document was stored under
        object_key: String,
        /// Local staging copy, left on disk
        staged_path: PathBuf,
        /// Number of per-project detail entries in the document
        detail_count: usize,
        /// Projects whose detail fetch failed and were skipped
        skipped: Vec<String>,
    },
}

/// Parse a target date argument, yyyy-mm-dd only
///
/// chrono's numeric fields are flexible-width, so unpadded forms like
/// `2024-3-2` would otherwise slip through; only the canonical
/// zero-padded rendering of the parsed date is accepted.
pub fn parse_target_date(input: &str) -> Result<NaiveDate, ConfigError> {
    let parsed = NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map_err(|_| ConfigError::InvalidDate(input.to_string()))?;

    if parsed.format(DATE_FORMAT).to_string() != input {
        return Err(ConfigError::InvalidDate(input.to_string()));
    }

    Ok(parsed)
}

/// Execute one run end to end
///
/// At most one document is assembled and at most one upload is performed.
/// `downloaded_at` is snapped once, after the detail loop completes, and
/// the staged file and the uploaded object serialize that same document.
pub async fn run<F, S>(
    params: &RunParameters,
    fetcher: &F,
    sink: &Sink<S>,
) -> Result<RunOutcome, RunError>
where
    F: ActivityFetcher,
    S: ObjectStore,
{
    let date_str = params.target_date.format(DATE_FORMAT).to_string();

    let summary = fetcher
        .fetch_summary(&params.user_id, params.target_date)
        .await?;

    if summary.projects.is_empty() {
        tracing::info!(target_date = %date_str, "No projects found");
        return Ok(RunOutcome::NothingToReport);
    }

    let mut details = Vec::with_capacity(summary.projects.len());
    let mut skipped = Vec::new();
    for project in &summary.projects {
        match fetcher
            .fetch_detail(&params.user_id, params.target_date, &project.name)
            .await
        {
            Ok(detail) => details.push(detail),
            Err(e) => {
                tracing::warn!(
                    project_name = %project.name,
                    user_id = %params.user_id,
                    target_date = %date_str,
                    error = %e,
                    "Failed to fetch project details, skipping"
                );
                skipped.push(project.name.clone());
            }
        }
    }

    let document = AggregateDocument::assemble(&date_str, Utc::now(), summary.raw, details);
    let detail_count = document.by_details.len();

    let staged_path = sink.stage(&document)?;
    let object_key = sink.upload(&staged_path, params.target_date).await?;

    Ok(RunOutcome::Uploaded {
        object_key,
        staged_path,
        detail_count,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_date_accepts_valid() {
        let parsed = parse_target_date("2024-03-02").unwrap();
        assert_eq!(parsed.format(DATE_FORMAT).to_string(), "2024-03-02");
        assert!(parse_target_date("1999-12-31").is_ok());
        assert!(parse_target_date("2024-02-29").is_ok()); // leap day
    }

    #[test]
    fn test_parse_target_date_rejects_invalid() {
        for input in ["2024-13-01", "01-01-2024", "", "2024-03-2x", "2023-02-29"] {
            assert!(
                matches!(parse_target_date(input), Err(ConfigError::InvalidDate(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_parse_target_date_rejects_unpadded_digits() {
        for input in ["2024-3-2", "2024-03-2", "2024-3-02", "24-03-02"] {
            assert!(
                matches!(parse_target_date(input), Err(ConfigError::InvalidDate(_))),
                "accepted {input:?}"
            );
        }
    }
}
