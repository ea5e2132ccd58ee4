//! Refresh and watch commands

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::{AggregationPipeline, RefreshStats};
use crate::progress::start_spinner;
use crate::remote::YouTubeClient;
use crate::store::LocalStore;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Build a pipeline backed by the YouTube Data API.
///
/// Fails before any request if the configuration or API key is unusable.
pub fn build_pipeline(config: &Config, store: LocalStore) -> Result<AggregationPipeline> {
    let api_key = config.api_key()?;
    let client = YouTubeClient::new(&config.remote, api_key)?;
    AggregationPipeline::new(config, Arc::new(client), store)
}

/// Run one refresh, abandoning it on Ctrl-C
pub async fn cmd_refresh(pipeline: &AggregationPipeline, show_progress: bool) -> Result<RefreshStats> {
    let spinner = show_progress.then(|| {
        start_spinner(&format!(
            "Refreshing {} playlists",
            pipeline.playlists().len()
        ))
    });

    let result = pipeline.refresh_until(ctrl_c()).await;

    if let Some(spinner) = spinner {
        match &result {
            Ok(stats) => spinner.finish_with_message(format!("{} videos", stats.videos_merged)),
            Err(_) => spinner.abandon_with_message("refresh aborted"),
        }
    }
    result
}

/// Outcome of a watch session
#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchSummary {
    pub refreshes: usize,
    pub failures: usize,
    pub last: Option<RefreshStats>,
}

/// Refresh immediately and then every `period` until `shutdown` resolves.
///
/// A failed refresh is logged and retried at the next tick; the cache keeps
/// its last committed state in between.
pub async fn cmd_watch<F>(
    pipeline: &AggregationPipeline,
    period: Duration,
    shutdown: F,
) -> Result<WatchSummary>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut summary = WatchSummary::default();

    info!(period_secs = period.as_secs(), "Watching for new videos");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        match pipeline.refresh_until(&mut shutdown).await {
            Ok(stats) => {
                summary.refreshes += 1;
                info!(
                    inserted = stats.inserted,
                    merged = stats.videos_merged,
                    "Scheduled refresh complete"
                );
                summary.last = Some(stats);
            }
            Err(Error::Cancelled) => break,
            Err(e) => {
                summary.refreshes += 1;
                summary.failures += 1;
                warn!(error = %e, "Scheduled refresh failed; retrying next interval");
            }
        }
    }

    info!(
        refreshes = summary.refreshes,
        failures = summary.failures,
        "Stopped watching"
    );
    Ok(summary)
}

/// Resolves on Ctrl-C. If the signal handler cannot be installed, never resolves.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

pub fn print_refresh_stats(stats: &RefreshStats) {
    println!("\n🔄 Refresh Complete\n");
    println!("Playlists: {}", stats.playlists_resolved);
    if stats.playlists_empty > 0 {
        println!("  Empty: {}", stats.playlists_empty);
    }
    println!("Videos fetched: {}", stats.videos_fetched);
    println!("Videos in feed: {}", stats.videos_merged);
    println!("New: {}", stats.inserted);
    if stats.updated > 0 {
        println!("Updated: {}", stats.updated);
    }
    println!("Already cached: {}", stats.unchanged);
    if stats.videos_excluded > 0 {
        println!("Excluded by keyword: {}", stats.videos_excluded);
    }
    if stats.duplicates > 0 {
        println!("Duplicates merged: {}", stats.duplicates);
    }
    if stats.videos_skipped > 0 {
        println!("Skipped (malformed): {}", stats.videos_skipped);
    }
}

pub fn print_watch_summary(summary: &WatchSummary) {
    println!("\n👀 Watch Stopped\n");
    println!("Refreshes: {}", summary.refreshes);
    println!("Failures: {}", summary.failures);
}
