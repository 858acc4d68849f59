//! Aggregate document model
//!
//! This is the one format the archiver owns. The persisted JSON has
//! exactly four top-level fields (`meta`, `parameters`, `summaries`,
//! `by_details`); downstream consumers depend on this shape staying
//! stable, so the summary and detail payloads are embedded verbatim.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Date format used for run parameters and object keys
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Run metadata recorded alongside the payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Assembly timestamp, RFC3339
    pub downloaded_at: String,
}

/// Run parameters echoed into the archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Target date as supplied or defaulted, yyyy-mm-dd
    pub target_date: String,
}

/// The unit persisted by this system, one per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDocument {
    pub meta: Meta,
    pub parameters: Parameters,
    /// Full raw summary response, embedded verbatim
    pub summaries: Value,
    /// One entry per project whose detail fetch succeeded, in summary order
    pub by_details: Vec<Map<String, Value>>,
}

impl AggregateDocument {
    /// Assemble the document, snapping `downloaded_at` from `assembled_at`
    ///
    /// Called once per run, after all detail fetches have completed. Both
    /// the staging write and the upload serialize this same value.
    pub fn assemble(
        target_date: &str,
        assembled_at: DateTime<Utc>,
        summaries: Value,
        by_details: Vec<Map<String, Value>>,
    ) -> Self {
        Self {
            meta: Meta {
                downloaded_at: assembled_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            parameters: Parameters {
                target_date: target_date.to_string(),
            },
            summaries,
            by_details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> AggregateDocument {
        let detail: Map<String, Value> = serde_json::from_value(serde_json::json!({
            "data": [{"projects": [{"name": "alpha"}], "grand_total": {"hours": 2}}]
        }))
        .unwrap();

        AggregateDocument::assemble(
            "2024-03-02",
            Utc.with_ymd_and_hms(2024, 3, 3, 1, 30, 0).unwrap(),
            serde_json::json!({"data": [{"projects": [{"name": "alpha"}]}]}),
            vec![detail],
        )
    }

    #[test]
    fn test_downloaded_at_is_rfc3339() {
        let doc = sample();
        assert_eq!(doc.meta.downloaded_at, "2024-03-03T01:30:00Z");
        assert!(doc.meta.downloaded_at.parse::<DateTime<Utc>>().is_ok());
    }

    #[test]
    fn test_serialized_shape_has_exactly_four_fields() {
        let value = serde_json::to_value(sample()).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 4);
        for field in ["meta", "parameters", "summaries", "by_details"] {
            assert!(object.contains_key(field), "missing {field}");
        }
        assert_eq!(value["parameters"]["target_date"], "2024-03-02");
        assert!(value["by_details"].is_array());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let doc = sample();
        let encoded = serde_json::to_string(&doc).unwrap();
        let decoded: AggregateDocument = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, doc);
    }
}
