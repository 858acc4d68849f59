//! waka-archiver - Daily WakaTime activity archiver
//!
//! Pulls one day of time-tracking activity from the WakaTime API,
//! enriches the summary with per-project detail breakdowns, and uploads
//! the aggregate document to object storage. Designed to run once per day
//! as a batch job; reruns for the same date overwrite the same object.

use anyhow::{Context, Result};
use chrono::{Days, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waka_archiver::pipeline::{self, RunOutcome, RunParameters};
use waka_archiver::services::{api_key_from_env, WakatimeClient};
use waka_archiver::sink::{GcsStore, Sink};

const DEFAULT_USER_ID: &str = "52f058ec-e04e-436b-906d-eff6c461abf5";

/// Command-line arguments for waka-archiver
#[derive(Parser, Debug)]
#[command(name = "waka-archiver")]
#[command(about = "Daily WakaTime activity archiver")]
#[command(version)]
struct Args {
    /// Target date to process (yyyy-mm-dd), defaults to yesterday
    #[arg(long, env = "WAKA_TARGET_DATE")]
    target_date: Option<String>,

    /// WakaTime user ID to process
    #[arg(long, default_value = DEFAULT_USER_ID, env = "WAKA_USER_ID")]
    user_id: String,

    /// Directory for local staging copies
    #[arg(long, default_value = ".tmp")]
    staging_dir: PathBuf,

    /// Destination bucket for uploads
    #[arg(long, default_value = "wakatime", env = "WAKA_BUCKET")]
    bucket: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waka_archiver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let target_date = match &args.target_date {
        Some(input) => pipeline::parse_target_date(input)?,
        None => Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .context("Failed to compute yesterday's date")?,
    };

    info!(
        "Starting waka-archiver v{} for {}",
        env!("CARGO_PKG_VERSION"),
        target_date
    );

    // Credential check happens before any network activity
    let api_key = api_key_from_env()?;
    let client = WakatimeClient::new(api_key).context("Failed to build WakaTime client")?;

    let store = GcsStore::new(args.bucket)
        .await
        .context("Failed to initialize object store")?;
    let sink = Sink::new(store, args.staging_dir);

    let params = RunParameters {
        target_date,
        user_id: args.user_id,
    };

    match pipeline::run(&params, &client, &sink).await? {
        RunOutcome::NothingToReport => {
            info!("No projects found, nothing to report");
        }
        RunOutcome::Uploaded {
            object_key,
            staged_path,
            detail_count,
            skipped,
        } => {
            info!(
                object_key = %object_key,
                staged_path = %staged_path.display(),
                detail_count,
                skipped_count = skipped.len(),
                "Archive uploaded"
            );
        }
    }

    info!("Process end");
    Ok(())
}
