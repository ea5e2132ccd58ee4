//! Status command implementation

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::resolve_playlists;
use crate::store::{LocalStore, RefreshRun, StoreStats};
use serde::Serialize;
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub api_base_url: String,
    pub api_key_env: String,
    pub api_key_set: bool,
    pub subscriptions: usize,
    pub playlists: usize,
    pub store: StoreStats,
    pub last_refresh: Option<RefreshRun>,
}

/// Get system status
pub async fn cmd_status(config: &Config, store: &LocalStore) -> Result<StatusInfo> {
    info!("Getting status");

    let playlists = resolve_playlists(&config.subscriptions, &config.playlists)?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        api_base_url: config.remote.base_url.clone(),
        api_key_env: config.remote.api_key_env.clone(),
        api_key_set: config.api_key().is_ok(),
        subscriptions: config.subscriptions.len(),
        playlists: playlists.len(),
        store: store.stats().await?,
        last_refresh: store.latest_refresh_run().await?,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 deeptube Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nCatalog:");
    println!("  URL: {}", status.api_base_url);
    let key_status = if status.api_key_set {
        "✓ Set".to_string()
    } else {
        format!("✗ Not set (export {})", status.api_key_env)
    };
    println!("  API key: {}", key_status);
    println!("\nSubscriptions: {}", status.subscriptions);
    println!("Playlists followed: {}", status.playlists);
    println!("\nCache:");
    println!("  Videos: {}", status.store.video_count);
    println!("  Hidden: {}", status.store.hidden_count);
    println!("  Thumbnails: {}", status.store.thumbnail_count);

    match &status.last_refresh {
        Some(run) => {
            println!("\nLast refresh: {} ({})", run.started_at, run.status);
            println!(
                "  Fetched: {}, New: {}, Updated: {}",
                run.videos_fetched, run.videos_inserted, run.videos_updated
            );
            if let Some(error) = &run.error {
                println!("  Error: {}", error);
            }
        }
        None => println!("\nLast refresh: never"),
    }
}
