//! Prefetch command: download thumbnails ahead of time

use crate::config::Config;
use crate::error::Result;
use crate::feed::{select, FeedOptions};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::store::LocalStore;
use crate::thumbnail::ThumbnailCache;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PrefetchStats {
    pub videos: usize,
    pub images: usize,
    pub placeholders: usize,
}

/// Ensure thumbnails for the visible feed, `limit` videos deep
pub async fn cmd_prefetch(
    config: &Config,
    store: &LocalStore,
    limit: Option<usize>,
    show_progress: bool,
) -> Result<PrefetchStats> {
    let cache = ThumbnailCache::with_http(store.clone(), &config.thumbnails)?;
    let options = FeedOptions {
        limit: limit.unwrap_or(config.feed.limit),
        ..Default::default()
    };
    let records = select(store, &options).await?;
    info!(videos = records.len(), "Prefetching thumbnails");

    let pb = if show_progress {
        start_progress_bar(records.len(), "thumbnails")
    } else {
        None
    };

    let (cache, progress) = (&cache, &pb);
    let thumbnails: Vec<_> = stream::iter(&records)
        .map(|r| async move {
            let thumbnail = cache.ensure(&r.video_id, &r.thumbnail_url).await;
            advance_progress(progress);
            thumbnail
        })
        .buffer_unordered(config.thumbnails.concurrency.max(1))
        .collect()
        .await;

    let placeholders = thumbnails.iter().filter(|t| t.is_placeholder()).count();
    let stats = PrefetchStats {
        videos: records.len(),
        images: thumbnails.len() - placeholders,
        placeholders,
    };
    finish_progress(pb, &format!("{} images", stats.images));
    Ok(stats)
}

pub fn print_prefetch_stats(stats: &PrefetchStats) {
    println!("\n🖼  Prefetch Complete\n");
    println!("Videos: {}", stats.videos);
    println!("Thumbnails stored: {}", stats.images);
    if stats.placeholders > 0 {
        println!("Unavailable (placeholder): {}", stats.placeholders);
    }
}
