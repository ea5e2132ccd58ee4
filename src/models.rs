//! Core records shared by the pipeline, the store and the feed.

use crate::duration::VideoLength;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Playlist prefix for a channel's regular uploads (shorts and streams excluded).
pub const UPLOADS_PREFIX: &str = "UULF";
/// Playlist prefix for a channel's past live streams.
pub const LIVE_PREFIX: &str = "UULV";
/// Playlist prefix for a channel's shorts.
pub const SHORTS_PREFIX: &str = "UUSH";
/// Channel IDs carry this prefix; playlist IDs are derived by replacing it.
pub const CHANNEL_PREFIX: &str = "UC";

const WATCH_LINK_PREFIX: &str = "https://www.youtube.com/watch_popup?v=";

/// Which feed of a channel a resolved playlist represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    Uploads,
    Live,
    Shorts,
    /// A playlist listed explicitly in the configuration
    Explicit,
}

impl PlaylistKind {
    /// Prefix substituted for `UC` when deriving the playlist from a channel
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            PlaylistKind::Uploads => Some(UPLOADS_PREFIX),
            PlaylistKind::Live => Some(LIVE_PREFIX),
            PlaylistKind::Shorts => Some(SHORTS_PREFIX),
            PlaylistKind::Explicit => None,
        }
    }
}

impl fmt::Display for PlaylistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaylistKind::Uploads => write!(f, "uploads"),
            PlaylistKind::Live => write!(f, "live"),
            PlaylistKind::Shorts => write!(f, "shorts"),
            PlaylistKind::Explicit => write!(f, "playlist"),
        }
    }
}

/// A concrete remote playlist to list, with the filter that applies to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlaylist {
    pub playlist_id: String,
    pub kind: PlaylistKind,
    /// Display name of the subscription or playlist it came from
    pub origin: String,
    /// Lowercased exclusion keywords
    pub exclude_keywords: Vec<String>,
}

impl ResolvedPlaylist {
    /// True if the title contains any exclusion keyword, ignoring case
    pub fn excludes(&self, title: &str) -> bool {
        if self.exclude_keywords.is_empty() {
            return false;
        }
        let title = title.to_lowercase();
        self.exclude_keywords.iter().any(|k| title.contains(k.as_str()))
    }
}

/// A cached video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub duration: VideoLength,
    pub was_live: bool,
    pub thumbnail_url: String,
    pub hidden: bool,
}

impl VideoRecord {
    /// Link that opens the video in the catalog's popup player
    pub fn watch_link(&self) -> String {
        watch_link(&self.video_id)
    }
}

pub fn watch_link(video_id: &str) -> String {
    format!("{}{}", WATCH_LINK_PREFIX, video_id)
}

/// Order records newest first. The sort is stable, so equal timestamps keep
/// their merge order.
pub fn sort_newest_first(records: &mut [VideoRecord]) {
    records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, day: u32) -> VideoRecord {
        VideoRecord {
            video_id: id.to_string(),
            title: id.to_string(),
            channel_name: "chan".to_string(),
            description: String::new(),
            published_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            duration: VideoLength::default(),
            was_live: false,
            thumbnail_url: String::new(),
            hidden: false,
        }
    }

    #[test]
    fn test_excludes_is_case_insensitive() {
        let playlist = ResolvedPlaylist {
            playlist_id: "UULFabc".to_string(),
            kind: PlaylistKind::Uploads,
            origin: "abc".to_string(),
            exclude_keywords: vec!["live".to_string()],
        };
        assert!(playlist.excludes("LIVE: Q&A"));
        assert!(playlist.excludes("We're Live now"));
        assert!(!playlist.excludes("A quiet tutorial"));
    }

    #[test]
    fn test_sort_newest_first_is_stable() {
        let mut records = vec![record("a", 1), record("b", 3), record("c", 3), record("d", 2)];
        sort_newest_first(&mut records);
        let ids: Vec<_> = records.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_watch_link() {
        assert_eq!(
            record("abc123", 1).watch_link(),
            "https://www.youtube.com/watch_popup?v=abc123"
        );
    }
}
