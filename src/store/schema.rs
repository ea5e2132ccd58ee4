//! SQLite schema definition

/// SQL schema for the video cache
pub const SCHEMA_SQL: &str = r#"
-- Videos: one row per video ever ingested
CREATE TABLE IF NOT EXISTS videos (
    video_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    channel_name TEXT NOT NULL,
    description TEXT NOT NULL,
    published_at TEXT NOT NULL,
    hours INTEGER NOT NULL DEFAULT 0,
    minutes INTEGER NOT NULL DEFAULT 0,
    seconds INTEGER NOT NULL DEFAULT 0,
    was_live INTEGER NOT NULL DEFAULT 0,
    thumbnail_url TEXT NOT NULL,
    hidden INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Thumbnails: downloaded images, written at most once per video
CREATE TABLE IF NOT EXISTS thumbnails (
    video_id TEXT PRIMARY KEY,
    thumbnail BLOB NOT NULL,
    fetched_at TEXT NOT NULL
);

-- Refresh runs: tracking history
CREATE TABLE IF NOT EXISTS refresh_runs (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    playlists_resolved INTEGER DEFAULT 0,
    videos_fetched INTEGER DEFAULT 0,
    videos_inserted INTEGER DEFAULT 0,
    videos_updated INTEGER DEFAULT 0,
    error TEXT
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_videos_published ON videos(published_at);
CREATE INDEX IF NOT EXISTS idx_runs_started ON refresh_runs(started_at);
"#;
