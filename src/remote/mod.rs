//! Remote catalog access
//!
//! This module provides:
//! - A trait for the two read-only catalog operations the pipeline needs
//! - The YouTube Data API implementation of that trait
//! - Request rate limiting shared across concurrent fetches
//!
//! The client is a thin fetch boundary: it does no filtering, merging or
//! persistence. Every failure is reported as `Error::Remote` naming the
//! playlist or batch involved.

mod rate_limit;
mod youtube;

pub use rate_limit::*;
pub use youtube::*;

use crate::duration::parse_duration;
use crate::error::{Error, Result};
use crate::models::VideoRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Video details as the catalog returns them, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFragment {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub description: String,
    /// RFC 3339 publish timestamp
    pub published_at: String,
    /// Raw duration token, e.g. `PT4M13S`
    pub duration: String,
    /// The video carries live-streaming details
    pub was_live: bool,
    /// Best available thumbnail, empty if none was offered
    pub thumbnail_url: String,
}

impl VideoFragment {
    /// Validate the raw fields into a cache record.
    ///
    /// Fails with `Error::Format` if the duration or publish time cannot be parsed.
    pub fn into_record(self, from_live_feed: bool) -> Result<VideoRecord> {
        let duration = parse_duration(&self.duration)
            .map_err(|e| Error::Format(format!("video {}: {}", self.video_id, e)))?;
        let published_at = DateTime::parse_from_rfc3339(&self.published_at)
            .map_err(|e| {
                Error::Format(format!(
                    "video {}: publish time {:?}: {}",
                    self.video_id, self.published_at, e
                ))
            })?
            .with_timezone(&Utc);

        Ok(VideoRecord {
            video_id: self.video_id,
            title: self.title,
            channel_name: self.channel_name,
            description: self.description,
            published_at,
            duration,
            was_live: self.was_live || from_live_feed,
            thumbnail_url: self.thumbnail_url,
            hidden: false,
        })
    }
}

/// Read-only access to the remote catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// List the video IDs on the first page of a playlist
    async fn list_video_ids(&self, playlist_id: &str) -> Result<Vec<String>>;

    /// Fetch details for a batch of video IDs
    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<VideoFragment>>;
}
