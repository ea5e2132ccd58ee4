//! Configuration management for deeptube
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! The subscription and playlist lists live in the same file as the tuning
//! knobs for the remote client, the refresh pipeline and the thumbnail cache.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::models::CHANNEL_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Largest page the catalog serves for playlist items and video batches
pub const MAX_PAGE_SIZE: u32 = 50;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote catalog client configuration
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Refresh pipeline configuration
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Thumbnail cache configuration
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,

    /// Feed display configuration
    #[serde(default)]
    pub feed: FeedConfig,

    /// Subscribed channels
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<Subscription>,

    /// Explicitly followed playlists
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub playlists: Vec<PlaylistRef>,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// A subscribed channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Display name
    #[serde(alias = "channel")]
    pub name: String,

    /// Channel ID (starts with `UC`)
    #[serde(alias = "id")]
    pub channel_id: String,

    /// Free-form tags, informational only
    #[serde(default)]
    pub categories: Vec<String>,

    /// Also follow the channel's past live streams
    #[serde(default)]
    pub live: bool,

    /// Also follow the channel's shorts
    #[serde(default)]
    pub shorts: bool,

    /// Titles containing any of these (ignoring case) are dropped
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
}

/// An explicitly followed playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRef {
    /// Display name
    pub name: String,

    /// Playlist ID
    #[serde(alias = "id")]
    pub playlist_id: String,

    /// Free-form tags, informational only
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Remote catalog client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Playlist items fetched per playlist (only the first page is read)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Request timeout in seconds
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,

    /// Retries for transport errors and server errors
    #[serde(default = "default_remote_retries")]
    pub retries: usize,

    /// Maximum requests per second against the catalog
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Refresh pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Playlists fetched concurrently
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Refresh title/description/duration of videos already in the cache.
    /// Hidden flags and thumbnails are never touched either way.
    #[serde(default = "default_update_existing")]
    pub update_existing: bool,

    /// Minutes between refreshes in `watch` mode
    #[serde(default = "default_refresh_interval")]
    pub interval_minutes: u64,

    /// Minutes after which a refresh left running by a dead process is
    /// treated as abandoned
    #[serde(default = "default_refresh_stale_after")]
    pub stale_after_minutes: u64,
}

/// Thumbnail cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Download timeout in seconds
    #[serde(default = "default_thumbnail_timeout")]
    pub timeout_secs: u64,

    /// Concurrent downloads when prefetching
    #[serde(default = "default_thumbnail_concurrency")]
    pub concurrency: usize,
}

/// Feed display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Number of videos shown
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for deeptube data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_api_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_remote_timeout(),
            retries: default_remote_retries(),
            requests_per_second: default_requests_per_second(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: default_fetch_concurrency(),
            update_existing: default_update_existing(),
            interval_minutes: default_refresh_interval(),
            stale_after_minutes: default_refresh_stale_after(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_thumbnail_timeout(),
            concurrency: default_thumbnail_concurrency(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            limit: default_feed_limit(),
        }
    }
}

impl Config {
    /// Get the default base directory for deeptube (~/.deeptube)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".deeptube")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("videos.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config = Self::from_toml(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("videos.db"),
            base_dir: base,
        };

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded = Self::from_toml(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Get the catalog API key from the environment
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.remote.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::Config(format!(
                "API key not set: export {}",
                self.remote.api_key_env
            ))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.remote.page_size == 0 || self.remote.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "remote.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.remote.requests_per_second == 0 {
            return Err(Error::Config(
                "remote.requests_per_second must be positive".to_string(),
            ));
        }

        if self.remote.timeout_secs == 0 {
            return Err(Error::Config(
                "remote.timeout_secs must be positive".to_string(),
            ));
        }

        if self.refresh.fetch_concurrency == 0 {
            return Err(Error::Config(
                "refresh.fetch_concurrency must be positive".to_string(),
            ));
        }

        if self.refresh.interval_minutes == 0 {
            return Err(Error::Config(
                "refresh.interval_minutes must be positive".to_string(),
            ));
        }

        if self.refresh.stale_after_minutes == 0 {
            return Err(Error::Config(
                "refresh.stale_after_minutes must be positive".to_string(),
            ));
        }

        if self.thumbnails.timeout_secs == 0 || self.thumbnails.concurrency == 0 {
            return Err(Error::Config(
                "thumbnails.timeout_secs and thumbnails.concurrency must be positive".to_string(),
            ));
        }

        for sub in &self.subscriptions {
            if !sub.channel_id.starts_with(CHANNEL_PREFIX) || sub.channel_id.len() <= 2 {
                return Err(Error::Config(format!(
                    "subscription '{}': channel_id '{}' must start with '{}'",
                    sub.name, sub.channel_id, CHANNEL_PREFIX
                )));
            }
        }

        for playlist in &self.playlists {
            if playlist.playlist_id.trim().is_empty() {
                return Err(Error::Config(format!(
                    "playlist '{}' has an empty playlist_id",
                    playlist.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[refresh]
fetch_concurrency = 2

[[subscriptions]]
name = "Some Channel"
channel_id = "UCabcdef"
categories = ["tech"]
live = true
exclude_keywords = ["live", "Podcast"]

[[subscriptions]]
channel = "Legacy Keys"
id = "UCzzz"

[[playlists]]
name = "Talks"
playlist_id = "PL123"
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.remote.page_size, 10);
        assert_eq!(config.remote.api_key_env, "YOUTUBE_API_KEY");
        assert!(!config.refresh.update_existing);
        assert_eq!(config.remote.base_url, YOUTUBE_API_BASE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_subscriptions_and_playlists() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.refresh.fetch_concurrency, 2);
        assert_eq!(config.subscriptions.len(), 2);
        assert!(config.subscriptions[0].live);
        assert!(!config.subscriptions[0].shorts);
        assert_eq!(config.subscriptions[0].exclude_keywords, vec!["live", "Podcast"]);
        assert_eq!(config.subscriptions[1].name, "Legacy Keys");
        assert_eq!(config.subscriptions[1].channel_id, "UCzzz");
        assert_eq!(config.playlists[0].playlist_id, "PL123");
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let err = Config::from_toml("[[subscriptions]]\nname = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.feed.limit = 7;
        config.playlists.push(PlaylistRef {
            name: "Talks".to_string(),
            playlist_id: "PL1".to_string(),
            categories: vec![],
        });

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.feed.limit, 7);
        assert_eq!(loaded.playlists.len(), 1);
        assert_eq!(loaded.paths.db_file, tmp.path().join("videos.db"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.remote.page_size = 0;
        assert!(config.validate().is_err());
        config.remote.page_size = 51;
        assert!(config.validate().is_err());
        config.remote.page_size = 50;
        assert!(config.validate().is_ok());

        config.refresh.fetch_concurrency = 0;
        assert!(config.validate().is_err());
        config.refresh.fetch_concurrency = 1;

        config.refresh.stale_after_minutes = 0;
        assert!(config.validate().is_err());
        config.refresh.stale_after_minutes = 5;
        assert!(config.validate().is_ok());

        config.subscriptions.push(Subscription {
            name: "bad".to_string(),
            channel_id: "PLnotachannel".to_string(),
            categories: vec![],
            live: false,
            shorts: false,
            exclude_keywords: vec![],
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let mut config = Config::default();
        config.remote.api_key_env = "DEEPTUBE_TEST_KEY_THAT_IS_NOT_SET".to_string();
        assert!(matches!(config.api_key(), Err(Error::Config(_))));
    }
}
