//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::LocalStore;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

const EXAMPLE_ENTRIES: &str = r#"
# Subscribe to a channel by its ID (starts with UC):
#
# [[subscriptions]]
# name = "Some Channel"
# channel_id = "UCxxxxxxxxxxxxxxxxxxxxxx"
# categories = ["tech"]
# live = false
# shorts = false
# exclude_keywords = ["live", "podcast"]
#
# Or follow a playlist directly:
#
# [[playlists]]
# name = "Conference talks"
# playlist_id = "PLxxxxxxxxxxxxxxxx"
"#;

/// Where init wrote things
#[derive(Debug, Clone, Serialize)]
pub struct InitInfo {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
}

/// Write a default configuration and create the video database.
///
/// An existing config is only replaced with `force`.
pub async fn cmd_init(base_dir: PathBuf, config_path: PathBuf, force: bool) -> Result<InitInfo> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path.clone();

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = format!("{}{}", toml::to_string_pretty(&config)?, EXAMPLE_ENTRIES);
    std::fs::write(&config_path, rendered)?;
    info!("Created config at {:?}", config_path);

    let store = LocalStore::connect(&config).await?;
    store.close().await;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(InitInfo {
        config_path,
        db_path: config.paths.db_file,
    })
}

pub fn print_init(info: &InitInfo, api_key_env: &str) {
    println!("✓ deeptube initialized");
    println!("  Config: {}", info.config_path.display());
    println!("  Database: {}", info.db_path.display());
    println!("\nNext steps:");
    println!("  1. Add [[subscriptions]] or [[playlists]] to the config file");
    println!("  2. export {}=<your API key>", api_key_env);
    println!("  3. deeptube refresh");
}
