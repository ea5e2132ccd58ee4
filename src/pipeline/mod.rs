//! Refresh pipeline
//!
//! Resolves subscriptions into playlists, fetches each playlist's first page
//! of videos, drops excluded titles, merges and sorts the results, and
//! commits them to the store in one transaction.
//!
//! A refresh is all-or-nothing: any remote or store failure aborts it and the
//! previous cache stays as it was. Only one refresh runs at a time against a
//! store, even across processes: each refresh first claims a lease in the
//! store's run table, and a second request while the lease is held is
//! rejected.

use crate::config::{Config, PlaylistRef, Subscription};
use crate::error::{Error, Result};
use crate::models::{
    sort_newest_first, PlaylistKind, ResolvedPlaylist, VideoRecord, CHANNEL_PREFIX,
};
use crate::remote::CatalogClient;
use crate::store::{LocalStore, MergePolicy, ReconcileStats, RunStatus};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Refresh statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshStats {
    pub run_id: String,
    pub playlists_resolved: usize,
    pub playlists_empty: usize,
    pub videos_fetched: usize,
    pub videos_excluded: usize,
    pub videos_skipped: usize,
    pub duplicates: usize,
    pub videos_merged: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Merged, sorted result of fetching every playlist
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    /// Newest first, unique by video ID
    pub records: Vec<VideoRecord>,
    pub playlists_empty: usize,
    pub videos_fetched: usize,
    pub videos_excluded: usize,
    pub videos_skipped: usize,
    pub duplicates: usize,
}

/// Surviving records of one playlist
#[derive(Debug, Default)]
struct PlaylistBatch {
    records: Vec<VideoRecord>,
    fetched: usize,
    excluded: usize,
    skipped: usize,
}

/// Expand subscriptions and explicit playlists into concrete playlists.
///
/// Order is deterministic: each subscription's uploads, live and shorts
/// feeds in configuration order, then the explicit playlists.
pub fn resolve_playlists(
    subscriptions: &[Subscription],
    playlists: &[PlaylistRef],
) -> Result<Vec<ResolvedPlaylist>> {
    let mut resolved = Vec::new();

    for sub in subscriptions {
        let suffix = sub
            .channel_id
            .strip_prefix(CHANNEL_PREFIX)
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "subscription '{}': channel_id '{}' must start with '{}'",
                    sub.name, sub.channel_id, CHANNEL_PREFIX
                ))
            })?;

        let exclude_keywords: Vec<String> = sub
            .exclude_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let mut kinds = vec![PlaylistKind::Uploads];
        if sub.live {
            kinds.push(PlaylistKind::Live);
        }
        if sub.shorts {
            kinds.push(PlaylistKind::Shorts);
        }

        for kind in kinds {
            if let Some(prefix) = kind.prefix() {
                resolved.push(ResolvedPlaylist {
                    playlist_id: format!("{}{}", prefix, suffix),
                    kind,
                    origin: sub.name.clone(),
                    exclude_keywords: exclude_keywords.clone(),
                });
            }
        }
    }

    for playlist in playlists {
        resolved.push(ResolvedPlaylist {
            playlist_id: playlist.playlist_id.clone(),
            kind: PlaylistKind::Explicit,
            origin: playlist.name.clone(),
            exclude_keywords: Vec::new(),
        });
    }

    Ok(resolved)
}

/// Merge playlist batches in order. The first occurrence of a video wins;
/// a duplicate only contributes its live marker.
fn merge(batches: Vec<PlaylistBatch>) -> Aggregate {
    let mut aggregate = Aggregate::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for batch in batches {
        aggregate.videos_fetched += batch.fetched;
        aggregate.videos_excluded += batch.excluded;
        aggregate.videos_skipped += batch.skipped;
        if batch.fetched == 0 {
            aggregate.playlists_empty += 1;
        }

        for record in batch.records {
            match seen.get(&record.video_id) {
                Some(&idx) => {
                    aggregate.records[idx].was_live |= record.was_live;
                    aggregate.duplicates += 1;
                }
                None => {
                    seen.insert(record.video_id.clone(), aggregate.records.len());
                    aggregate.records.push(record);
                }
            }
        }
    }

    sort_newest_first(&mut aggregate.records);
    aggregate
}

/// Aggregates the configured playlists into the local store
pub struct AggregationPipeline {
    client: Arc<dyn CatalogClient>,
    store: LocalStore,
    playlists: Vec<ResolvedPlaylist>,
    fetch_concurrency: usize,
    policy: MergePolicy,
    stale_after: chrono::Duration,
}

impl AggregationPipeline {
    /// Build a pipeline. Configuration problems surface here, before any
    /// request or write.
    pub fn new(config: &Config, client: Arc<dyn CatalogClient>, store: LocalStore) -> Result<Self> {
        config.validate()?;
        let playlists = resolve_playlists(&config.subscriptions, &config.playlists)?;
        let policy = if config.refresh.update_existing {
            MergePolicy::RefreshMetadata
        } else {
            MergePolicy::InsertIfAbsent
        };

        Ok(Self {
            client,
            store,
            playlists,
            fetch_concurrency: config.refresh.fetch_concurrency.max(1),
            policy,
            stale_after: chrono::Duration::minutes(config.refresh.stale_after_minutes as i64),
        })
    }

    /// The resolved playlists, in fetch order
    pub fn playlists(&self) -> &[ResolvedPlaylist] {
        &self.playlists
    }

    /// Fetch, filter, merge and sort without touching the store
    pub async fn aggregate(&self) -> Result<Aggregate> {
        let batches: Vec<PlaylistBatch> = stream::iter(self.playlists.iter())
            .map(|playlist| self.fetch_playlist(playlist))
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await?;

        Ok(merge(batches))
    }

    /// Run one refresh to completion
    pub async fn refresh(&self) -> Result<RefreshStats> {
        self.refresh_until(std::future::pending::<()>()).await
    }

    /// Run one refresh, abandoning it if `shutdown` resolves first.
    ///
    /// Abandoning drops all in-flight requests; an uncommitted transaction
    /// rolls back, so the store keeps its last committed state.
    pub async fn refresh_until<F>(&self, shutdown: F) -> Result<RefreshStats>
    where
        F: Future<Output = ()>,
    {
        let Some(run) = self.store.claim_refresh_run(self.stale_after).await? else {
            return Err(Error::RefreshInProgress);
        };
        info!(
            run_id = %run.id,
            playlists = self.playlists.len(),
            "Starting refresh"
        );

        let outcome = tokio::select! {
            result = self.run_refresh() => result,
            _ = shutdown => Err(Error::Cancelled),
        };

        match outcome {
            Ok((aggregate, reconciled)) => {
                let stats = RefreshStats {
                    run_id: run.id.clone(),
                    playlists_resolved: self.playlists.len(),
                    playlists_empty: aggregate.playlists_empty,
                    videos_fetched: aggregate.videos_fetched,
                    videos_excluded: aggregate.videos_excluded,
                    videos_skipped: aggregate.videos_skipped,
                    duplicates: aggregate.duplicates,
                    videos_merged: aggregate.records.len(),
                    inserted: reconciled.inserted,
                    updated: reconciled.updated,
                    unchanged: reconciled.unchanged,
                };
                if let Err(e) = self
                    .store
                    .complete_refresh_run(
                        &run.id,
                        RunStatus::Completed,
                        stats.playlists_resolved,
                        stats.videos_fetched,
                        reconciled,
                        None,
                    )
                    .await
                {
                    warn!(run_id = %run.id, error = %e, "Failed to record refresh run");
                }
                info!(
                    run_id = %run.id,
                    merged = stats.videos_merged,
                    inserted = stats.inserted,
                    updated = stats.updated,
                    "Refresh complete"
                );
                Ok(stats)
            }
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "Refresh aborted; cache unchanged");
                if let Err(record_err) = self
                    .store
                    .complete_refresh_run(
                        &run.id,
                        RunStatus::Failed,
                        self.playlists.len(),
                        0,
                        ReconcileStats::default(),
                        Some(e.to_string()),
                    )
                    .await
                {
                    warn!(run_id = %run.id, error = %record_err, "Failed to record refresh run");
                }
                Err(e)
            }
        }
    }

    async fn run_refresh(&self) -> Result<(Aggregate, ReconcileStats)> {
        let aggregate = self.aggregate().await?;
        let reconciled = self.store.reconcile(&aggregate.records, self.policy).await?;
        Ok((aggregate, reconciled))
    }

    async fn fetch_playlist(&self, playlist: &ResolvedPlaylist) -> Result<PlaylistBatch> {
        let ids = self.client.list_video_ids(&playlist.playlist_id).await?;
        if ids.is_empty() {
            debug!(playlist_id = %playlist.playlist_id, "Playlist is empty, skipping");
            return Ok(PlaylistBatch::default());
        }

        let fragments = self.client.fetch_details(&ids).await?;
        let mut batch = PlaylistBatch {
            fetched: fragments.len(),
            ..Default::default()
        };

        for fragment in fragments {
            let record = match fragment.into_record(playlist.kind == PlaylistKind::Live) {
                Ok(record) => record,
                Err(e) => {
                    warn!(playlist_id = %playlist.playlist_id, error = %e, "Skipping video");
                    batch.skipped += 1;
                    continue;
                }
            };

            if playlist.excludes(&record.title) {
                debug!(video_id = %record.video_id, origin = %playlist.origin, "Excluded by keyword");
                batch.excluded += 1;
                continue;
            }

            batch.records.push(record);
        }

        debug!(
            playlist_id = %playlist.playlist_id,
            kind = %playlist.kind,
            kept = batch.records.len(),
            "Fetched playlist"
        );
        Ok(batch)
    }
}
