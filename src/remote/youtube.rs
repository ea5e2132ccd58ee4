use super::{CatalogClient, RequestRateLimiter, VideoFragment};
use crate::config::{RemoteConfig, MAX_PAGE_SIZE};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const VIDEO_PARTS: &str = "contentDetails,snippet,liveStreamingDetails";

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    // Missing parts decode as empty so the item fails on its own later
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    content_details: ContentDetails,
    #[serde(default)]
    live_streaming_details: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<ThumbnailInfo>,
    medium: Option<ThumbnailInfo>,
    high: Option<ThumbnailInfo>,
    standard: Option<ThumbnailInfo>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailInfo {
    #[serde(default)]
    url: String,
}

impl Thumbnails {
    /// First available of standard, high, medium, default
    fn preferred_url(&self) -> String {
        [&self.standard, &self.high, &self.medium, &self.default]
            .into_iter()
            .flatten()
            .filter(|t| !t.url.is_empty())
            .map(|t| t.url.clone())
            .next()
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Failure of a single attempt, and whether trying again could help
enum Attempt {
    Retry(String),
    Fatal(Error),
}

/// YouTube Data API v3 client
pub struct YouTubeClient {
    client: Client,
    base_url: Url,
    api_key: String,
    page_size: u32,
    retries: usize,
    limiter: RequestRateLimiter,
}

impl YouTubeClient {
    /// Create a client. The API key is passed in, never read from globals here.
    pub fn new(config: &RemoteConfig, api_key: impl Into<String>) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            retries: config.retries,
            limiter: RequestRateLimiter::new(config.requests_per_second),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid catalog API URL: {}", e)))
    }

    /// GET with bounded retry. Returns `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        context: &str,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let mut last_err = String::from("request not attempted");

        for attempt in 0..=self.retries {
            self.limiter.wait().await;
            debug!(context, attempt, "GET {}", url.path());

            match self.try_get(context, url.clone(), query).await {
                Ok(parsed) => return Ok(parsed),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(msg)) => {
                    warn!(context, attempt, error = %msg, "Catalog request failed");
                    last_err = msg;
                }
            }

            if attempt < self.retries {
                tokio::time::sleep(Duration::from_millis(200 * (attempt + 1) as u64)).await;
            }
        }

        Err(Error::remote(context, last_err))
    }

    async fn try_get<T: DeserializeOwned>(
        &self,
        context: &str,
        url: Url,
        query: &[(&str, String)],
    ) -> std::result::Result<Option<T>, Attempt> {
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| Attempt::Retry(e.without_url().to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(Attempt::Retry(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Attempt::Fatal(Error::remote(
                context,
                format!("HTTP {}: {}", status, detail.trim()),
            )));
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| Attempt::Fatal(Error::remote(context, e.without_url())))
    }
}

#[async_trait]
impl CatalogClient for YouTubeClient {
    async fn list_video_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        let context = format!("playlist {}", playlist_id);
        let url = self.endpoint("playlistItems")?;
        let query = [
            ("part", "contentDetails".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", self.page_size.to_string()),
        ];

        // Only the first page is read.
        match self
            .get_json::<PlaylistItemsResponse>(&context, url, &query)
            .await?
        {
            Some(page) => Ok(page
                .items
                .into_iter()
                .map(|item| item.content_details.video_id)
                .collect()),
            None => {
                warn!(playlist_id, "Playlist not found; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<VideoFragment>> {
        let mut fragments = Vec::with_capacity(ids.len());

        for batch in ids.chunks(MAX_PAGE_SIZE as usize) {
            let context = format!("video batch [{}]", batch.join(","));
            let url = self.endpoint("videos")?;
            let query = [
                ("part", VIDEO_PARTS.to_string()),
                ("id", batch.join(",")),
                ("maxResults", MAX_PAGE_SIZE.to_string()),
            ];

            let Some(response) = self.get_json::<VideosResponse>(&context, url, &query).await?
            else {
                return Err(Error::remote(context, "videos endpoint not found"));
            };

            fragments.extend(response.items.into_iter().map(|item| VideoFragment {
                thumbnail_url: item.snippet.thumbnails.preferred_url(),
                video_id: item.id,
                title: item.snippet.title,
                channel_name: item.snippet.channel_title,
                description: item.snippet.description,
                published_at: item.snippet.published_at,
                duration: item.content_details.duration,
                was_live: item.live_streaming_details.is_some(),
            }));
        }

        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> YouTubeClient {
        let config = RemoteConfig {
            base_url: server.uri(),
            retries: 1,
            requests_per_second: 100,
            ..RemoteConfig::default()
        };
        YouTubeClient::new(&config, "test-key").unwrap()
    }

    #[tokio::test]
    async fn test_list_video_ids_first_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("playlistId", "UULFabc"))
            .and(query_param("maxResults", "10"))
            .and(query_param("part", "contentDetails"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nextPageToken": "ignored",
                "items": [
                    {"contentDetails": {"videoId": "v1"}},
                    {"contentDetails": {"videoId": "v2"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ids = client_for(&server).list_video_ids("UULFabc").await.unwrap();
        assert_eq!(ids, vec!["v1", "v2"]);
    }

    #[tokio::test]
    async fn test_missing_playlist_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let ids = client_for(&server).list_video_ids("UUSHabc").await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_quota_error_carries_context() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "quotaExceeded"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .list_video_ids("UULFabc")
            .await
            .unwrap_err();
        match err {
            Error::Remote { context, message } => {
                assert_eq!(context, "playlist UULFabc");
                assert!(message.contains("quotaExceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .list_video_ids("UULFabc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { .. }));
    }

    #[tokio::test]
    async fn test_fetch_details_picks_thumbnail_and_live_marker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "v1,v2"))
            .and(query_param("part", VIDEO_PARTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {
                        "id": "v1",
                        "snippet": {
                            "publishedAt": "2024-05-01T10:00:00Z",
                            "title": "First",
                            "description": "one",
                            "channelTitle": "Chan",
                            "thumbnails": {
                                "default": {"url": "https://img/default.jpg"},
                                "high": {"url": "https://img/high.jpg"},
                                "standard": {"url": "https://img/sd.jpg"}
                            }
                        },
                        "contentDetails": {"duration": "PT4M13S"}
                    },
                    {
                        "id": "v2",
                        "snippet": {
                            "publishedAt": "2024-05-02T10:00:00Z",
                            "title": "Stream",
                            "channelTitle": "Chan",
                            "thumbnails": {
                                "default": {"url": "https://img/default2.jpg"},
                                "medium": {"url": "https://img/medium2.jpg"}
                            }
                        },
                        "contentDetails": {"duration": "PT2H"},
                        "liveStreamingDetails": {"actualStartTime": "2024-05-02T10:00:00Z"}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let ids = vec!["v1".to_string(), "v2".to_string()];
        let fragments = client_for(&server).fetch_details(&ids).await.unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].thumbnail_url, "https://img/sd.jpg");
        assert_eq!(fragments[0].duration, "PT4M13S");
        assert!(!fragments[0].was_live);
        assert_eq!(fragments[1].thumbnail_url, "https://img/medium2.jpg");
        assert_eq!(fragments[1].description, "");
        assert!(fragments[1].was_live);
    }

    #[tokio::test]
    async fn test_fetch_details_empty_input_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let fragments = client_for(&server).fetch_details(&[]).await.unwrap();
        assert!(fragments.is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_item_does_not_fail_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {
                        "id": "good",
                        "snippet": {
                            "publishedAt": "2024-05-01T10:00:00Z",
                            "title": "Good",
                            "channelTitle": "Chan"
                        },
                        "contentDetails": {"duration": "PT1M"}
                    },
                    {"id": "bad", "snippet": {"title": "Bad"}, "contentDetails": {}},
                    {"id": "bare"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ids = vec!["good".to_string(), "bad".to_string(), "bare".to_string()];
        let fragments = client_for(&server).fetch_details(&ids).await.unwrap();
        assert_eq!(fragments.len(), 3);

        let mut fragments = fragments.into_iter();
        let good = fragments.next().unwrap().into_record(false).unwrap();
        assert_eq!(good.video_id, "good");
        assert_eq!(good.title, "Good");

        for fragment in fragments {
            assert_eq!(fragment.duration, "");
            assert!(matches!(fragment.into_record(false), Err(Error::Format(_))));
        }
    }

    #[test]
    fn test_thumbnail_without_any_size() {
        assert_eq!(Thumbnails::default().preferred_url(), "");
    }
}
