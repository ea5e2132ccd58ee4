//! Default values for configuration

/// Default environment variable holding the catalog API key
pub fn default_api_key_env() -> String {
    "YOUTUBE_API_KEY".to_string()
}

/// YouTube Data API v3 endpoint
pub const YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";

/// Default catalog API base URL
pub fn default_api_base_url() -> String {
    YOUTUBE_API_BASE_URL.to_string()
}

/// Default number of playlist items fetched per playlist (first page only)
pub fn default_page_size() -> u32 {
    10
}

/// Default request timeout in seconds
pub fn default_remote_timeout() -> u64 {
    30
}

/// Default retry count for transient remote failures
pub fn default_remote_retries() -> usize {
    2
}

/// Default catalog request rate (requests per second)
pub fn default_requests_per_second() -> u32 {
    10
}

/// Default user agent
pub fn default_user_agent() -> String {
    format!("deeptube/{}", env!("CARGO_PKG_VERSION"))
}

/// Default number of playlists fetched concurrently during a refresh
pub fn default_fetch_concurrency() -> usize {
    4
}

/// Default: insert-if-absent, never refresh known videos
pub fn default_update_existing() -> bool {
    false
}

/// Default interval between scheduled refreshes (minutes)
pub fn default_refresh_interval() -> u64 {
    30
}

/// Default age after which an unfinished refresh stops blocking new ones (minutes)
pub fn default_refresh_stale_after() -> u64 {
    30
}

/// Default thumbnail download timeout in seconds
pub fn default_thumbnail_timeout() -> u64 {
    10
}

/// Default number of concurrent thumbnail downloads
pub fn default_thumbnail_concurrency() -> usize {
    8
}

/// Default number of videos shown in the feed
pub fn default_feed_limit() -> usize {
    20
}
