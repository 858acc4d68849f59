//! WakaTime API client
//!
//! Implements the two fetch operations the pipeline needs: the day's
//! project summary and a per-project detail breakdown. Both hit the same
//! summaries endpoint; the detail call adds a `project` filter.
//!
//! Payloads are treated as loosely-structured JSON. Only the project list
//! is decoded into typed structs; everything else is carried verbatim so
//! the archive never depends on a schema the API does not guarantee.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::{ConfigError, FetchError};

const WAKATIME_BASE_URL: &str = "https://wakatime.com/api/v1";
const USER_AGENT: &str = "waka-archiver/0.1.0";
const API_KEY_VAR: &str = "WAKATIME_KEY";

/// One project entry from the summary's project list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectRef {
    /// Project name as reported by WakaTime
    pub name: String,
}

/// One day's worth of summary data
#[derive(Debug, Clone, Deserialize)]
struct DaySummary {
    #[serde(default)]
    projects: Vec<ProjectRef>,
}

/// Top-level summary envelope; a single-day range yields one `data` entry
#[derive(Debug, Clone, Deserialize)]
struct SummaryEnvelope {
    #[serde(default)]
    data: Vec<DaySummary>,
}

/// Result of a successful summary fetch
#[derive(Debug, Clone)]
pub struct SummaryFetch {
    /// Full decoded response, embedded verbatim in the archive
    pub raw: Value,
    /// Projects active on the target date, in response order
    pub projects: Vec<ProjectRef>,
}

/// Fetch operations the aggregator depends on
///
/// Seam for testing the pipeline without network access.
#[allow(async_fn_in_trait)]
pub trait ActivityFetcher {
    /// Fetch the day's top-level summary plus the discovered project list
    async fn fetch_summary(
        &self,
        user_id: &str,
        target_date: NaiveDate,
    ) -> Result<SummaryFetch, FetchError>;

    /// Fetch one project's detail breakdown for the day
    async fn fetch_detail(
        &self,
        user_id: &str,
        target_date: NaiveDate,
        project: &str,
    ) -> Result<Map<String, Value>, FetchError>;
}

/// WakaTime API client
pub struct WakatimeClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Read the API credential from the process environment
///
/// Checked before any network activity; an absent or empty key fails the
/// run immediately.
pub fn api_key_from_env() -> Result<String, ConfigError> {
    std::env::var(API_KEY_VAR)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingCredential(API_KEY_VAR))
}

impl WakatimeClient {
    /// Create a client against the production API
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_base_url(WAKATIME_BASE_URL, api_key)
    }

    /// Create a client against an explicit base URL (tests)
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build the summaries endpoint URL for a single-day range
    ///
    /// The detail variant of the request differs only by the `project`
    /// filter parameter. Query values are percent-encoded by the builder.
    fn summaries_url(
        &self,
        user_id: &str,
        target_date: NaiveDate,
        project: Option<&str>,
    ) -> Result<reqwest::Url, FetchError> {
        let date = target_date.format("%Y-%m-%d").to_string();
        let mut url = reqwest::Url::parse(&format!("{}/users/{}/summaries", self.base_url, user_id))
            .map_err(|e| FetchError::Network(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", &self.api_key);
            query.append_pair("start", &date);
            query.append_pair("end", &date);
            if let Some(project) = project {
                query.append_pair("project", project);
            }
        }

        Ok(url)
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<Value, FetchError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl ActivityFetcher for WakatimeClient {
    /// Fetch the summary for [target_date, target_date] with no project filter
    ///
    /// Returns the raw decoded document unmodified plus the project list
    /// taken from the first `data` entry (a single-day range yields one).
    async fn fetch_summary(
        &self,
        user_id: &str,
        target_date: NaiveDate,
    ) -> Result<SummaryFetch, FetchError> {
        let url = self.summaries_url(user_id, target_date, None)?;
        tracing::debug!(user_id = %user_id, %target_date, "Fetching summary");

        let raw = self.get_json(url).await?;

        let envelope: SummaryEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        let projects = envelope
            .data
            .into_iter()
            .next()
            .map(|day| day.projects)
            .unwrap_or_default();

        tracing::info!(
            user_id = %user_id,
            %target_date,
            project_count = projects.len(),
            "Summary fetched"
        );

        Ok(SummaryFetch { raw, projects })
    }

    /// Fetch one project's detail document, returned verbatim
    async fn fetch_detail(
        &self,
        user_id: &str,
        target_date: NaiveDate,
        project: &str,
    ) -> Result<Map<String, Value>, FetchError> {
        let url = self.summaries_url(user_id, target_date, Some(project))?;
        tracing::debug!(project = %project, user_id = %user_id, %target_date, "Fetching detail");

        let raw = self.get_json(url).await?;

        serde_json::from_value(raw).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
