//! Persistence sink: local staging file plus durable object storage
//!
//! The run serializes the aggregate document once to a staging file, then
//! reads that file back and uploads the bytes under a key derived from the
//! target date alone. Rerunning a date overwrites the previous object.
//! Both steps are single-attempt; the staging file is left on disk either
//! way, for inspection after a failed upload and as a local copy after a
//! successful one.

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::document::AggregateDocument;
use crate::error::SinkError;

const GCS_UPLOAD_BASE_URL: &str = "https://storage.googleapis.com/upload/storage/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const TOKEN_VAR: &str = "GCS_ACCESS_TOKEN";

/// Durable object storage, addressed by key
///
/// Seam to the remote storage collaborator: open a write for key K, copy
/// the bytes in, report success or failure.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), SinkError>;
}

/// Staging-then-upload sink for aggregate documents
pub struct Sink<S> {
    staging_dir: PathBuf,
    store: S,
}

impl<S: ObjectStore> Sink<S> {
    pub fn new(store: S, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            store,
        }
    }

    /// Object key for a target date: `raw/<yyyy_mm_dd>_summary.json`
    ///
    /// Derived from the date only, never from the run timestamp, so a
    /// rerun for the same date overwrites rather than accumulates.
    pub fn object_key(target_date: NaiveDate) -> String {
        format!("raw/{}_summary.json", target_date.format("%Y_%m_%d"))
    }

    /// Serialize the document to the staging directory
    ///
    /// Filename carries the wall-clock stamp at staging time; collisions
    /// are negligible for a once-daily job.
    pub fn stage(&self, document: &AggregateDocument) -> Result<PathBuf, SinkError> {
        fs::create_dir_all(&self.staging_dir)?;

        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let path = self.staging_dir.join(format!("output_{stamp}.json"));

        let bytes = serde_json::to_vec(document)?;
        fs::write(&path, bytes)?;

        tracing::info!(path = %path.display(), "Staged aggregate document");
        Ok(path)
    }

    /// Read the staged file back and write it to durable storage
    pub async fn upload(
        &self,
        staged_path: &Path,
        target_date: NaiveDate,
    ) -> Result<String, SinkError> {
        let key = Self::object_key(target_date);
        // The read-back belongs to the upload step; staging already succeeded
        let bytes = fs::read(staged_path)
            .map_err(|e| SinkError::Upload(format!("read staged file: {e}")))?;

        self.store.put(&key, bytes).await?;

        tracing::info!(key = %key, "Uploaded aggregate document");
        Ok(key)
    }
}

/// Google Cloud Storage implementation of [`ObjectStore`]
///
/// Uses the JSON API media upload endpoint. The bearer token comes from
/// `GCS_ACCESS_TOKEN` when set, otherwise from the GCE metadata server
/// (the job runs on GCP Batch with a service account attached).
pub struct GcsStore {
    http_client: reqwest::Client,
    bucket: String,
    token: String,
}

impl GcsStore {
    pub async fn new(bucket: impl Into<String>) -> Result<Self, SinkError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SinkError::Upload(e.to_string()))?;

        let token = Self::fetch_token(&http_client).await?;

        Ok(Self {
            http_client,
            bucket: bucket.into(),
            token,
        })
    }

    async fn fetch_token(http_client: &reqwest::Client) -> Result<String, SinkError> {
        if let Ok(token) = std::env::var(TOKEN_VAR) {
            if !token.is_empty() {
                return Ok(token);
            }
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let response = http_client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| SinkError::Upload(format!("metadata server: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Upload(format!(
                "metadata server returned {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Upload(format!("metadata token decode: {e}")))?;

        Ok(token.access_token)
    }
}

impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), SinkError> {
        let url = format!("{}/b/{}/o", GCS_UPLOAD_BASE_URL, self.bucket);

        tracing::debug!(bucket = %self.bucket, key = %key, "Uploading object to GCS");

        let response = self
            .http_client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| SinkError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SinkError::Upload(format!("GCS {status}: {error_text}")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::AggregateDocument;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory store capturing puts
    struct MemoryStore {
        objects: RefCell<HashMap<String, Vec<u8>>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                objects: RefCell::new(HashMap::new()),
            }
        }
    }

    impl ObjectStore for MemoryStore {
        async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), SinkError> {
            self.objects.borrow_mut().insert(key.to_string(), bytes);
            Ok(())
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_document() -> AggregateDocument {
        AggregateDocument::assemble(
            "2024-03-02",
            Utc.with_ymd_and_hms(2024, 3, 3, 1, 30, 0).unwrap(),
            serde_json::json!({"data": []}),
            vec![],
        )
    }

    #[test]
    fn test_object_key_depends_on_date_only() {
        let key = Sink::<MemoryStore>::object_key(date("2024-03-02"));
        assert_eq!(key, "raw/2024_03_02_summary.json");

        // Same date, same key, whatever the wall clock says
        assert_eq!(Sink::<MemoryStore>::object_key(date("2024-03-02")), key);
    }

    #[test]
    fn test_stage_writes_decodable_document() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(MemoryStore::new(), dir.path());

        let document = sample_document();
        let path = sink.stage(&document).unwrap();

        assert!(path.starts_with(dir.path()));
        let bytes = fs::read(&path).unwrap();
        let decoded: AggregateDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, document);
    }

    #[tokio::test]
    async fn test_upload_copies_staged_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(MemoryStore::new(), dir.path());

        let document = sample_document();
        let path = sink.stage(&document).unwrap();
        let key = sink.upload(&path, date("2024-03-02")).await.unwrap();

        let staged = fs::read(&path).unwrap();
        let uploaded = sink.store.objects.borrow().get(&key).cloned().unwrap();
        assert_eq!(uploaded, staged);
    }

    #[tokio::test]
    async fn test_upload_read_back_failure_reports_as_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::new(MemoryStore::new(), dir.path());

        let missing = dir.path().join("output_never-staged.json");
        let result = sink.upload(&missing, date("2024-03-02")).await;
        assert!(matches!(result, Err(SinkError::Upload(_))));
    }

    #[test]
    fn test_stage_fails_on_unwritable_staging_dir() {
        let dir = tempfile::tempdir().unwrap();

        // A plain file where the staging directory should be blocks
        // create_dir_all regardless of process privileges
        let blocked = dir.path().join("staging");
        fs::write(&blocked, b"not a directory").unwrap();

        let sink = Sink::new(MemoryStore::new(), &blocked);
        let result = sink.stage(&sample_document());
        assert!(matches!(result, Err(SinkError::Stage(_))));
    }
}
