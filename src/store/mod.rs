//! Local video cache using SQLite
//!
//! This module handles all local storage:
//! - Videos (metadata plus the user's hidden flag)
//! - Thumbnails (image blobs keyed by video ID)
//! - Refresh runs (history and stats, plus the lease that keeps refreshes
//!   from overlapping across processes)
//!
//! A single `LocalStore` handle is opened once and shared. Each refresh is
//! reconciled inside one transaction, so a failed or cancelled refresh leaves
//! the previous cache contents untouched.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::duration::VideoLength;
use crate::error::{Error, Result};
use crate::models::VideoRecord;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a refresh treats videos that are already cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Create missing rows, leave existing rows exactly as they are
    #[default]
    InsertIfAbsent,
    /// Create missing rows, refresh metadata of existing rows.
    /// The hidden flag and stored thumbnail are preserved.
    RefreshMetadata,
}

/// Refresh run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(Error::Other(format!("Unknown run status: {}", s))),
        }
    }
}

/// Row shape of the `videos` table
#[derive(Debug, Clone, FromRow)]
struct VideoRow {
    video_id: String,
    title: String,
    channel_name: String,
    description: String,
    published_at: String,
    hours: i64,
    minutes: i64,
    seconds: i64,
    was_live: bool,
    thumbnail_url: String,
    hidden: bool,
}

impl TryFrom<VideoRow> for VideoRecord {
    type Error = Error;

    fn try_from(row: VideoRow) -> Result<Self> {
        let published_at = DateTime::parse_from_rfc3339(&row.published_at)
            .map_err(|e| {
                Error::Format(format!(
                    "stored published_at {:?} for {}: {}",
                    row.published_at, row.video_id, e
                ))
            })?
            .with_timezone(&Utc);
        let component = |v: i64| u32::try_from(v).unwrap_or(0);

        Ok(VideoRecord {
            video_id: row.video_id,
            title: row.title,
            channel_name: row.channel_name,
            description: row.description,
            published_at,
            duration: VideoLength::new(
                component(row.hours),
                component(row.minutes),
                component(row.seconds),
            ),
            was_live: row.was_live,
            thumbnail_url: row.thumbnail_url,
            hidden: row.hidden,
        })
    }
}

/// A refresh run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshRun {
    pub id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub playlists_resolved: i64,
    pub videos_fetched: i64,
    pub videos_inserted: i64,
    pub videos_updated: i64,
    pub error: Option<String>,
}

impl RefreshRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: run_timestamp(Utc::now()),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            playlists_resolved: 0,
            videos_fetched: 0,
            videos_inserted: 0,
            videos_updated: 0,
            error: None,
        }
    }

    pub fn get_status(&self) -> Result<RunStatus> {
        self.status.parse()
    }
}

impl Default for RefreshRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of reconciling one refresh into the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub video_count: usize,
    pub hidden_count: usize,
    pub thumbnail_count: usize,
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

// Fixed width so run times order and compare as text
fn run_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Video cache handle
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Open the store configured for this installation
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::open(&config.paths.db_file).await
    }

    /// Open (creating if needed) the store at the given path
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Full);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };

        if !store.is_initialized().await? {
            store.init_schema().await?;
        }

        Ok(store)
    }

    /// Close all connections. Pending writes have completed once this returns.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='videos'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Video Operations =====

    /// Write a completed refresh in one transaction.
    ///
    /// Either every record is applied or, on any error, none are.
    pub async fn reconcile(
        &self,
        records: &[VideoRecord],
        policy: MergePolicy,
    ) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();
        let now = timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;

        for record in records {
            let inserted = sqlx::query(
                r#"
                INSERT INTO videos (video_id, title, channel_name, description, published_at, hours, minutes, seconds, was_live, thumbnail_url, hidden, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(video_id) DO NOTHING
                "#,
            )
            .bind(&record.video_id)
            .bind(&record.title)
            .bind(&record.channel_name)
            .bind(&record.description)
            .bind(timestamp(record.published_at))
            .bind(i64::from(record.duration.hours))
            .bind(i64::from(record.duration.minutes))
            .bind(i64::from(record.duration.seconds))
            .bind(record.was_live)
            .bind(&record.thumbnail_url)
            .bind(record.hidden)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted > 0 {
                stats.inserted += 1;
                continue;
            }

            match policy {
                MergePolicy::InsertIfAbsent => stats.unchanged += 1,
                MergePolicy::RefreshMetadata => {
                    sqlx::query(
                        r#"
                        UPDATE videos SET
                            title = ?,
                            channel_name = ?,
                            description = ?,
                            published_at = ?,
                            hours = ?,
                            minutes = ?,
                            seconds = ?,
                            was_live = ?,
                            thumbnail_url = ?,
                            updated_at = ?
                        WHERE video_id = ?
                        "#,
                    )
                    .bind(&record.title)
                    .bind(&record.channel_name)
                    .bind(&record.description)
                    .bind(timestamp(record.published_at))
                    .bind(i64::from(record.duration.hours))
                    .bind(i64::from(record.duration.minutes))
                    .bind(i64::from(record.duration.seconds))
                    .bind(record.was_live)
                    .bind(&record.thumbnail_url)
                    .bind(&now)
                    .bind(&record.video_id)
                    .execute(&mut *tx)
                    .await?;
                    stats.updated += 1;
                }
            }
        }

        tx.commit().await?;
        debug!(
            inserted = stats.inserted,
            updated = stats.updated,
            unchanged = stats.unchanged,
            "Reconciled refresh"
        );
        Ok(stats)
    }

    /// Mark a video hidden. Returns once the write is committed.
    pub async fn hide(&self, video_id: &str) -> Result<()> {
        let affected = sqlx::query("UPDATE videos SET hidden = 1, updated_at = ? WHERE video_id = ?")
            .bind(timestamp(Utc::now()))
            .bind(video_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(Error::VideoNotFound(video_id.to_string()));
        }
        info!(video_id, "Video hidden");
        Ok(())
    }

    /// All cached videos, hidden ones included, newest first
    pub async fn query(&self) -> Result<Vec<VideoRecord>> {
        let rows = sqlx::query_as::<_, VideoRow>(
            r#"
            SELECT video_id, title, channel_name, description, published_at, hours, minutes, seconds, was_live, thumbnail_url, hidden
            FROM videos
            ORDER BY published_at DESC, video_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(VideoRecord::try_from).collect()
    }

    /// Get a video by ID
    pub async fn get_video(&self, video_id: &str) -> Result<Option<VideoRecord>> {
        let row = sqlx::query_as::<_, VideoRow>(
            r#"
            SELECT video_id, title, channel_name, description, published_at, hours, minutes, seconds, was_live, thumbnail_url, hidden
            FROM videos WHERE video_id = ?
            "#,
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VideoRecord::try_from).transpose()
    }

    // ===== Thumbnail Operations =====

    /// Get the stored thumbnail for a video
    pub async fn get_thumbnail(&self, video_id: &str) -> Result<Option<Vec<u8>>> {
        let blob: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT thumbnail FROM thumbnails WHERE video_id = ?")
                .bind(video_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(blob)
    }

    /// Store a thumbnail unless one is already stored. Returns true if written.
    pub async fn insert_thumbnail_if_absent(&self, video_id: &str, data: &[u8]) -> Result<bool> {
        let affected = sqlx::query(
            r#"
            INSERT INTO thumbnails (video_id, thumbnail, fetched_at)
            VALUES (?, ?, ?)
            ON CONFLICT(video_id) DO NOTHING
            "#,
        )
        .bind(video_id)
        .bind(data)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    // ===== Refresh Run Operations =====

    /// Claim the refresh lease and record a new running run.
    ///
    /// Returns `None` while another run, from this or any other process, is
    /// still running and younger than `stale_after`. Older running rows are
    /// marked failed first, so a crashed process cannot block refreshes
    /// forever.
    pub async fn claim_refresh_run(&self, stale_after: Duration) -> Result<Option<RefreshRun>> {
        let now = Utc::now();
        let cutoff = run_timestamp(now - stale_after);
        let run = RefreshRun::new();

        let mut tx = self.pool.begin().await?;

        let expired = sqlx::query(
            r#"
            UPDATE refresh_runs SET
                status = ?,
                completed_at = ?,
                error = 'Lease expired before the run completed'
            WHERE status = ? AND started_at <= ?
            "#,
        )
        .bind(RunStatus::Failed.to_string())
        .bind(run_timestamp(now))
        .bind(RunStatus::Running.to_string())
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if expired > 0 {
            warn!(expired, "Expired abandoned refresh runs");
        }

        let claimed = sqlx::query(
            r#"
            INSERT INTO refresh_runs (id, started_at, status)
            SELECT ?, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM refresh_runs WHERE status = ? AND started_at > ?
            )
            "#,
        )
        .bind(&run.id)
        .bind(&run.started_at)
        .bind(&run.status)
        .bind(RunStatus::Running.to_string())
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        if claimed == 0 {
            debug!("Refresh lease is held by another run");
            return Ok(None);
        }
        Ok(Some(run))
    }

    /// Complete a refresh run
    pub async fn complete_refresh_run(
        &self,
        id: &str,
        status: RunStatus,
        playlists_resolved: usize,
        videos_fetched: usize,
        reconciled: ReconcileStats,
        error: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE refresh_runs SET
                completed_at = ?,
                status = ?,
                playlists_resolved = ?,
                videos_fetched = ?,
                videos_inserted = ?,
                videos_updated = ?,
                error = ?
            WHERE id = ?
            "#,
        )
        .bind(run_timestamp(Utc::now()))
        .bind(status.to_string())
        .bind(playlists_resolved as i64)
        .bind(videos_fetched as i64)
        .bind(reconciled.inserted as i64)
        .bind(reconciled.updated as i64)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the latest refresh run
    pub async fn latest_refresh_run(&self) -> Result<Option<RefreshRun>> {
        let run = sqlx::query_as::<_, RefreshRun>(
            "SELECT * FROM refresh_runs ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(run)
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn stats(&self) -> Result<StoreStats> {
        let video_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;

        let hidden_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos WHERE hidden = 1")
            .fetch_one(&self.pool)
            .await?;

        let thumbnail_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM thumbnails")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            video_count: video_count as usize,
            hidden_count: hidden_count as usize,
            thumbnail_count: thumbnail_count as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn setup_test_store() -> (LocalStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");

        let store = LocalStore::connect(&config).await.unwrap();
        (store, tmp)
    }

    fn record(id: &str, title: &str, day: u32) -> VideoRecord {
        VideoRecord {
            video_id: id.to_string(),
            title: title.to_string(),
            channel_name: "Channel".to_string(),
            description: "desc".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 3, day, 8, 30, 0).unwrap(),
            duration: VideoLength::new(0, 12, 5),
            was_live: false,
            thumbnail_url: format!("https://i.ytimg.com/vi/{}/sddefault.jpg", id),
            hidden: false,
        }
    }

    #[tokio::test]
    async fn test_reconcile_and_query() {
        let (store, _tmp) = setup_test_store().await;

        let stats = store
            .reconcile(
                &[record("v1", "First", 1), record("v2", "Second", 2)],
                MergePolicy::InsertIfAbsent,
            )
            .await
            .unwrap();
        assert_eq!(stats.inserted, 2);

        let videos = store.query().await.unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].video_id, "v2");
        assert_eq!(videos[1], record("v1", "First", 1));
    }

    #[tokio::test]
    async fn test_hide_keeps_other_fields() {
        let (store, _tmp) = setup_test_store().await;
        let original = record("v1", "First", 1);
        store
            .reconcile(&[original.clone()], MergePolicy::InsertIfAbsent)
            .await
            .unwrap();

        store.hide("v1").await.unwrap();

        let videos = store.query().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert!(videos[0].hidden);
        let mut expected = original;
        expected.hidden = true;
        assert_eq!(videos[0], expected);
    }

    #[tokio::test]
    async fn test_hide_unknown_video() {
        let (store, _tmp) = setup_test_store().await;
        let err = store.hide("missing").await.unwrap_err();
        assert!(matches!(err, Error::VideoNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_insert_if_absent_preserves_state() {
        let (store, _tmp) = setup_test_store().await;
        store
            .reconcile(&[record("v1", "Original", 1)], MergePolicy::InsertIfAbsent)
            .await
            .unwrap();
        store.hide("v1").await.unwrap();
        store.insert_thumbnail_if_absent("v1", b"jpeg").await.unwrap();

        let stats = store
            .reconcile(&[record("v1", "Retitled", 1)], MergePolicy::InsertIfAbsent)
            .await
            .unwrap();
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.inserted, 0);

        let loaded = store.get_video("v1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Original");
        assert!(loaded.hidden);
        assert_eq!(store.get_thumbnail("v1").await.unwrap().unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_refresh_metadata_keeps_hidden() {
        let (store, _tmp) = setup_test_store().await;
        store
            .reconcile(&[record("v1", "Original", 1)], MergePolicy::InsertIfAbsent)
            .await
            .unwrap();
        store.hide("v1").await.unwrap();

        let stats = store
            .reconcile(&[record("v1", "Retitled", 1)], MergePolicy::RefreshMetadata)
            .await
            .unwrap();
        assert_eq!(stats.updated, 1);

        let loaded = store.get_video("v1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Retitled");
        assert!(loaded.hidden);
    }

    #[tokio::test]
    async fn test_thumbnail_written_once() {
        let (store, _tmp) = setup_test_store().await;
        assert!(store.get_thumbnail("v1").await.unwrap().is_none());
        assert!(store.insert_thumbnail_if_absent("v1", b"first").await.unwrap());
        assert!(!store.insert_thumbnail_if_absent("v1", b"second").await.unwrap());
        assert_eq!(store.get_thumbnail("v1").await.unwrap().unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_refresh_runs_and_stats() {
        let (store, _tmp) = setup_test_store().await;
        let run = store
            .claim_refresh_run(Duration::minutes(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.get_status().unwrap(), RunStatus::Running);

        store
            .reconcile(&[record("v1", "First", 1)], MergePolicy::InsertIfAbsent)
            .await
            .unwrap();
        store.hide("v1").await.unwrap();
        store
            .complete_refresh_run(
                &run.id,
                RunStatus::Completed,
                3,
                1,
                ReconcileStats {
                    inserted: 1,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let latest = store.latest_refresh_run().await.unwrap().unwrap();
        assert_eq!(latest.id, run.id);
        assert_eq!(latest.get_status().unwrap(), RunStatus::Completed);
        assert_eq!(latest.videos_inserted, 1);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.video_count, 1);
        assert_eq!(stats.hidden_count, 1);
        assert_eq!(stats.thumbnail_count, 0);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("videos.db");

        let store = LocalStore::open(&path).await.unwrap();
        store
            .reconcile(&[record("v1", "First", 1)], MergePolicy::InsertIfAbsent)
            .await
            .unwrap();
        store.hide("v1").await.unwrap();
        store.close().await;

        let store = LocalStore::open(&path).await.unwrap();
        let videos = store.query().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert!(videos[0].hidden);
    }

    #[tokio::test]
    async fn test_refresh_lease_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("videos.db");
        let first = LocalStore::open(&path).await.unwrap();
        let second = LocalStore::open(&path).await.unwrap();
        let stale_after = Duration::minutes(30);

        let run = first.claim_refresh_run(stale_after).await.unwrap().unwrap();
        assert!(second.claim_refresh_run(stale_after).await.unwrap().is_none());
        assert!(first.claim_refresh_run(stale_after).await.unwrap().is_none());

        first
            .complete_refresh_run(
                &run.id,
                RunStatus::Failed,
                0,
                0,
                ReconcileStats::default(),
                Some("boom".to_string()),
            )
            .await
            .unwrap();

        let next = second.claim_refresh_run(stale_after).await.unwrap().unwrap();
        assert_ne!(next.id, run.id);
        let latest = first.latest_refresh_run().await.unwrap().unwrap();
        assert_eq!(latest.id, next.id);
    }

    #[tokio::test]
    async fn test_abandoned_run_lease_expires() {
        let (store, _tmp) = setup_test_store().await;
        let started = run_timestamp(Utc::now() - Duration::hours(2));
        sqlx::query("INSERT INTO refresh_runs (id, started_at, status) VALUES ('dead', ?, 'running')")
            .bind(&started)
            .execute(&store.pool)
            .await
            .unwrap();

        let run = store
            .claim_refresh_run(Duration::minutes(30))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(run.id, "dead");

        let (status, error): (String, Option<String>) =
            sqlx::query_as("SELECT status, error FROM refresh_runs WHERE id = 'dead'")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(status, "failed");
        assert!(error.unwrap().contains("Lease expired"));
    }
}
