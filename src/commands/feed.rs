//! List and hide commands

use crate::config::Config;
use crate::error::Result;
use crate::feed::{build_feed, FeedOptions, VideoView};
use crate::store::LocalStore;
use crate::thumbnail::ThumbnailCache;
use chrono::Utc;
use tracing::info;

/// List options
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Overrides `feed.limit`
    pub limit: Option<usize>,
    pub include_hidden: bool,
    /// Download missing thumbnails while listing
    pub thumbnails: bool,
}

/// Build the feed from the cache. Nothing is fetched from the catalog.
pub async fn cmd_list(
    config: &Config,
    store: &LocalStore,
    options: ListOptions,
) -> Result<Vec<VideoView>> {
    let cache = ThumbnailCache::with_http(store.clone(), &config.thumbnails)?;
    let feed_options = FeedOptions {
        limit: options.limit.unwrap_or(config.feed.limit),
        include_hidden: options.include_hidden,
        with_thumbnails: options.thumbnails,
    };
    build_feed(store, &cache, Utc::now(), &feed_options).await
}

/// Hide videos from the feed. Stops at the first unknown ID; IDs before it
/// stay hidden.
pub async fn cmd_hide(store: &LocalStore, video_ids: &[String]) -> Result<usize> {
    for video_id in video_ids {
        store.hide(video_id).await?;
        info!(video_id = %video_id, "Hidden");
    }
    Ok(video_ids.len())
}

pub fn print_feed(views: &[VideoView]) {
    if views.is_empty() {
        println!("No videos cached. Run 'deeptube refresh' first.");
        return;
    }

    for (i, view) in views.iter().enumerate() {
        let live = if view.live { " 🔴 live" } else { "" };
        let hidden = if view.hidden { " (hidden)" } else { "" };
        println!("{:>3}. {}{}", i + 1, view.title, hidden);
        println!(
            "     {} · {}{} · {}",
            view.channel, view.duration, live, view.published
        );
        println!("     {}", view.link);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::remote::VideoFragment;
    use crate::store::MergePolicy;
    use tempfile::TempDir;

    async fn seeded_store(tmp: &TempDir) -> LocalStore {
        let store = LocalStore::open(&tmp.path().join("videos.db")).await.unwrap();
        let records: Vec<_> = ["v1", "v2"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                VideoFragment {
                    video_id: id.to_string(),
                    title: format!("Video {}", i),
                    channel_name: "Chan".to_string(),
                    description: String::new(),
                    published_at: format!("2024-01-0{}T00:00:00Z", i + 1),
                    duration: "PT1M".to_string(),
                    was_live: false,
                    thumbnail_url: String::new(),
                }
                .into_record(false)
                .unwrap()
            })
            .collect();
        store.reconcile(&records, MergePolicy::InsertIfAbsent).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_list_then_hide() {
        let tmp = TempDir::new().unwrap();
        let store = seeded_store(&tmp).await;
        let config = Config::default();

        let views = cmd_list(&config, &store, ListOptions::default()).await.unwrap();
        let ids: Vec<_> = views.iter().map(|v| v.video_id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v1"]);

        assert_eq!(cmd_hide(&store, &["v2".to_string()]).await.unwrap(), 1);
        let views = cmd_list(&config, &store, ListOptions::default()).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].video_id, "v1");
    }

    #[tokio::test]
    async fn test_hide_unknown_id() {
        let tmp = TempDir::new().unwrap();
        let store = seeded_store(&tmp).await;

        let err = cmd_hide(&store, &["v1".to_string(), "nope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VideoNotFound(id) if id == "nope"));
        assert!(store.get_video("v1").await.unwrap().unwrap().hidden);
    }
}
