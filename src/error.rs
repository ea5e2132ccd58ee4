//! Custom error types for deeptube

use thiserror::Error;

/// Main error type for deeptube operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Remote catalog error ({context}): {message}")]
    Remote { context: String, message: String },

    #[error("Format error: {0}")]
    Format(String),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("A refresh is already in progress")]
    RefreshInProgress,

    #[error("Refresh cancelled before commit")]
    Cancelled,

    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a remote error tagged with the playlist or batch it concerns
    pub fn remote(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Remote {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for deeptube
pub type Result<T> = std::result::Result<T, Error>;
