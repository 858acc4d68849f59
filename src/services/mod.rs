//! External API clients

pub mod wakatime_client;

pub use wakatime_client::{
    api_key_from_env, ActivityFetcher, ProjectRef, SummaryFetch, WakatimeClient,
};
