//! Display-ready view of the cached feed

use crate::error::Result;
use crate::models::VideoRecord;
use crate::store::LocalStore;
use crate::thumbnail::{Thumbnail, ThumbnailCache};
use crate::timefmt::time_since;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Feed selection options
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Maximum number of videos
    pub limit: usize,
    /// Include videos the user hid
    pub include_hidden: bool,
    /// Fetch thumbnails for the listed videos
    pub with_thumbnails: bool,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            limit: crate::config::default_feed_limit(),
            include_hidden: false,
            with_thumbnails: true,
        }
    }
}

/// One row of the feed, ready to render
#[derive(Debug, Clone, Serialize)]
pub struct VideoView {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    /// e.g. `1h 2m 3s`
    pub duration: String,
    pub live: bool,
    pub hidden: bool,
    /// e.g. `3 hours ago`
    pub published: String,
    pub published_at: DateTime<Utc>,
    pub link: String,
    #[serde(skip)]
    pub thumbnail: Thumbnail,
}

impl VideoView {
    pub fn new(record: &VideoRecord, now: DateTime<Utc>, thumbnail: Thumbnail) -> Self {
        Self {
            video_id: record.video_id.clone(),
            title: record.title.clone(),
            channel: record.channel_name.clone(),
            duration: record.duration.to_string(),
            live: record.was_live,
            hidden: record.hidden,
            published: time_since(now, record.published_at),
            published_at: record.published_at,
            link: record.watch_link(),
            thumbnail,
        }
    }
}

/// Select records from the store in feed order
pub async fn select(store: &LocalStore, options: &FeedOptions) -> Result<Vec<VideoRecord>> {
    Ok(store
        .query()
        .await?
        .into_iter()
        .filter(|r| options.include_hidden || !r.hidden)
        .take(options.limit)
        .collect())
}

/// Build the feed newest first. Thumbnails are fetched on demand and never
/// fail the feed.
pub async fn build_feed(
    store: &LocalStore,
    cache: &ThumbnailCache,
    now: DateTime<Utc>,
    options: &FeedOptions,
) -> Result<Vec<VideoView>> {
    let records = select(store, options).await?;

    let thumbnails = if options.with_thumbnails {
        cache.ensure_many(&records).await
    } else {
        vec![Thumbnail::Placeholder; records.len()]
    };

    Ok(records
        .iter()
        .zip(thumbnails)
        .map(|(record, thumbnail)| VideoView::new(record, now, thumbnail))
        .collect())
}
