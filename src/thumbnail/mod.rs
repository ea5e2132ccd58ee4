//! Lazily fetched thumbnails
//!
//! Each video's thumbnail is downloaded at most once and stored in the
//! `LocalStore`. Concurrent requests for the same video serialize on a
//! per-video lock, so the second caller finds the stored image instead of
//! downloading it again. A missing or failed thumbnail never fails the
//! caller; it degrades to a placeholder.

use crate::config::ThumbnailConfig;
use crate::error::{Error, Result};
use crate::models::VideoRecord;
use crate::store::LocalStore;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// A thumbnail ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    Image(Vec<u8>),
    /// No image is available; show a placeholder
    Placeholder,
}

impl Thumbnail {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Thumbnail::Image(data) => Some(data),
            Thumbnail::Placeholder => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Thumbnail::Placeholder)
    }
}

/// Downloads thumbnail images
#[async_trait]
pub trait ThumbnailFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Plain HTTP thumbnail downloads
pub struct HttpThumbnailFetcher {
    client: Client,
}

impl HttpThumbnailFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Thumbnail(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ThumbnailFetcher for HttpThumbnailFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Thumbnail(format!("{}: {}", url, e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Thumbnail(format!("HTTP {}: {}", status, url)));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::Thumbnail(format!("{}: {}", url, e.without_url())))?;
        if data.is_empty() {
            return Err(Error::Thumbnail(format!("empty body: {}", url)));
        }
        Ok(data.to_vec())
    }
}

/// Store-backed thumbnail cache
pub struct ThumbnailCache {
    store: LocalStore,
    fetcher: Arc<dyn ThumbnailFetcher>,
    timeout: Duration,
    concurrency: usize,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThumbnailCache {
    pub fn new(
        store: LocalStore,
        fetcher: Arc<dyn ThumbnailFetcher>,
        config: &ThumbnailConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            timeout: Duration::from_secs(config.timeout_secs),
            concurrency: config.concurrency.max(1),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Cache that downloads over HTTP
    pub fn with_http(store: LocalStore, config: &ThumbnailConfig) -> Result<Self> {
        let fetcher = HttpThumbnailFetcher::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(store, Arc::new(fetcher), config))
    }

    /// Return the stored thumbnail, downloading and storing it first if needed.
    pub async fn ensure(&self, video_id: &str, url: &str) -> Thumbnail {
        match self.try_ensure(video_id, url).await {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                warn!(video_id, error = %e, "Thumbnail unavailable, using placeholder");
                Thumbnail::Placeholder
            }
        }
    }

    /// Ensure thumbnails for many records, a bounded number at a time.
    /// Results are in the same order as `records`.
    pub async fn ensure_many(&self, records: &[VideoRecord]) -> Vec<Thumbnail> {
        stream::iter(records)
            .map(|r| self.ensure(&r.video_id, &r.thumbnail_url))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
    }

    async fn try_ensure(&self, video_id: &str, url: &str) -> Result<Thumbnail> {
        if let Some(data) = self.store.get_thumbnail(video_id).await? {
            return Ok(Thumbnail::Image(data));
        }

        if url.is_empty() {
            debug!(video_id, "No thumbnail URL");
            return Ok(Thumbnail::Placeholder);
        }

        let lock = self.lock_for(video_id);
        let result = {
            let _guard = lock.lock().await;
            self.download_once(video_id, url).await
        };
        self.release(video_id, lock);
        result
    }

    /// Runs with the per-video lock held.
    async fn download_once(&self, video_id: &str, url: &str) -> Result<Thumbnail> {
        // Another caller may have finished while we waited for the lock.
        if let Some(data) = self.store.get_thumbnail(video_id).await? {
            return Ok(Thumbnail::Image(data));
        }

        debug!(video_id, url, "Downloading thumbnail");
        let data = tokio::time::timeout(self.timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| {
                Error::Thumbnail(format!("timed out after {:?}: {}", self.timeout, url))
            })??;

        self.store.insert_thumbnail_if_absent(video_id, &data).await?;
        Ok(Thumbnail::Image(data))
    }

    fn lock_for(&self, video_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        in_flight
            .entry(video_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release(&self, video_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        // Only the map and this handle remain: nobody else is waiting.
        if Arc::strong_count(&lock) <= 2 {
            in_flight.remove(video_id);
        }
    }
}
