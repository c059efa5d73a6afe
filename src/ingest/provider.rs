//! YouTube Data API v3 client.
//!
//! Thin typed wrapper over the three endpoints ingestion needs: channel
//! resolution, the uploads playlist, and batched video details - plus the
//! live-stream lookup. Every call is bounded by client timeouts and retried
//! with backoff on quota and transport errors before the failure is handed
//! to the batch accounting.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Retry delays on quota/network failures, in seconds.
const BACKOFF_DELAYS: [u64; 3] = [2, 8, 30];

/// Details batches are capped by the API at 50 ids per call.
pub const DETAILS_BATCH_SIZE: usize = 50;

pub struct YouTubeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// A channel resolved to the ids ingestion works with.
#[derive(Debug, Clone)]
pub struct ResolvedChannel {
    pub channel_id: String,
    pub uploads_playlist_id: String,
}

/// One uploads-playlist entry (no duration/view count yet).
#[derive(Debug, Clone)]
pub struct PlaylistVideo {
    pub youtube_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VideoDetails {
    pub youtube_id: String,
    pub duration_seconds: i64,
    pub view_count: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LiveVideo {
    pub youtube_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

impl YouTubeClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Resolve a channel handle ("@name"), channel id ("UC…") or legacy
    /// username to its id and uploads playlist.
    pub async fn resolve_channel(&self, identifier: &str) -> Result<ResolvedChannel> {
        let lookup_param = if identifier.starts_with('@') {
            ("forHandle", identifier.to_string())
        } else if identifier.starts_with("UC") {
            ("id", identifier.to_string())
        } else {
            ("forUsername", identifier.trim_start_matches('@').to_string())
        };

        let response: ChannelListResponse = self
            .get_with_retry(
                "channels",
                &[("part", "contentDetails"), (lookup_param.0, lookup_param.1.as_str())],
            )
            .await?;

        let channel = response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("YouTube channel not found: {}", identifier))?;

        Ok(ResolvedChannel {
            channel_id: channel.id,
            uploads_playlist_id: channel.content_details.related_playlists.uploads,
        })
    }

    /// One page of the uploads playlist (50 items max) plus the token for
    /// the next page, if any.
    pub async fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<(Vec<PlaylistVideo>, Option<String>)> {
        let mut query = vec![
            ("part", "snippet,contentDetails".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", "50".to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let response: PlaylistItemsResponse = self.get_with_retry("playlistItems", &query).await?;

        let videos = response
            .items
            .into_iter()
            .map(|item| PlaylistVideo {
                youtube_id: item.content_details.video_id,
                title: item.snippet.title,
                description: non_empty(item.snippet.description),
                thumbnail_url: item.snippet.thumbnails.best_url(),
                published_at: item.snippet.published_at,
            })
            .collect();

        Ok((videos, response.next_page_token))
    }

    /// Durations and view counts for up to [`DETAILS_BATCH_SIZE`] videos.
    pub async fn video_details(&self, youtube_ids: &[String]) -> Result<Vec<VideoDetails>> {
        if youtube_ids.is_empty() {
            return Ok(Vec::new());
        }
        if youtube_ids.len() > DETAILS_BATCH_SIZE {
            bail!("video_details called with {} ids (max {})", youtube_ids.len(), DETAILS_BATCH_SIZE);
        }

        let ids = youtube_ids.join(",");
        let response: VideoListResponse = self
            .get_with_retry("videos", &[("part", "contentDetails,statistics"), ("id", &ids)])
            .await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| VideoDetails {
                youtube_id: item.id,
                duration_seconds: parse_iso8601_duration(&item.content_details.duration),
                view_count: item
                    .statistics
                    .view_count
                    .as_deref()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
            })
            .collect())
    }

    /// The channel's current live stream, if one is running.
    pub async fn live_video(&self, channel_id: &str) -> Result<Option<LiveVideo>> {
        let response: SearchListResponse = self
            .get_with_retry(
                "search",
                &[
                    ("part", "snippet"),
                    ("channelId", channel_id),
                    ("eventType", "live"),
                    ("type", "video"),
                    ("maxResults", "1"),
                ],
            )
            .await?;

        Ok(response.items.into_iter().next().map(|item| LiveVideo {
            youtube_id: item.id.video_id,
            title: item.snippet.title,
            thumbnail_url: item.snippet.thumbnails.best_url(),
        }))
    }

    /// GET an endpoint with the API key attached, retrying with backoff on
    /// quota (403/429), server (5xx) and transport errors.
    async fn get_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);

        for attempt in 0..=BACKOFF_DELAYS.len() {
            match self.get_once(&url, query).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < BACKOFF_DELAYS.len() && e.retryable => {
                    let delay = BACKOFF_DELAYS[attempt];
                    tracing::warn!(
                        "YouTube API call to {} failed (attempt {}), retrying in {}s: {}",
                        endpoint,
                        attempt + 1,
                        delay,
                        e.message
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
                Err(e) => return Err(anyhow!("{}", e.message)),
            }
        }
        unreachable!()
    }

    async fn get_once<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<T, CallError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| CallError { message: format!("request failed: {e}"), retryable: true })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError {
                message: format!("YouTube API returned {status}"),
                retryable: status.as_u16() == 403 || status.as_u16() == 429 || status.is_server_error(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CallError { message: format!("invalid API response: {e}"), retryable: false })
    }
}

struct CallError {
    message: String,
    retryable: bool,
}

/// Parse an ISO-8601 duration ("PT1H2M3S") into seconds. Anything
/// unparseable counts as zero, matching how the catalog treats unknown
/// durations.
pub fn parse_iso8601_duration(duration: &str) -> i64 {
    let Some(rest) = duration.strip_prefix("PT") else {
        return 0;
    };

    let mut seconds: i64 = 0;
    let mut number = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let value: i64 = match number.parse() {
            Ok(v) => v,
            Err(_) => return 0,
        };
        number.clear();
        match c {
            'H' => seconds += value * 3600,
            'M' => seconds += value * 60,
            'S' => seconds += value,
            _ => return 0,
        }
    }
    seconds
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

// ── Wire DTOs ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: ChannelContentDetails,
}

#[derive(Debug, Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
    #[serde(rename = "contentDetails")]
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemContentDetails {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    description: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best_url(self) -> Option<String> {
        self.high
            .or(self.medium)
            .or(self.default)
            .map(|t| t.url)
    }
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: VideoContentDetails,
    #[serde(default)]
    statistics: VideoStatistics,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_durations() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration("PT45M"), 2700);
        assert_eq!(parse_iso8601_duration("PT30S"), 30);
        assert_eq!(parse_iso8601_duration("PT2H"), 7200);
    }

    #[test]
    fn unparseable_durations_are_zero() {
        assert_eq!(parse_iso8601_duration(""), 0);
        assert_eq!(parse_iso8601_duration("P0D"), 0);
        assert_eq!(parse_iso8601_duration("PTXS"), 0);
    }

    #[test]
    fn playlist_response_deserializes() {
        let json = r#"{
            "items": [{
                "snippet": {
                    "title": "15/01/2024 - Frère Jean Dupont : La foi",
                    "description": "Culte du dimanche #foi",
                    "publishedAt": "2024-01-15T18:00:00Z",
                    "thumbnails": {"high": {"url": "https://img/high.jpg"}}
                },
                "contentDetails": {"videoId": "abc123"}
            }],
            "nextPageToken": "CAUQAA"
        }"#;
        let parsed: PlaylistItemsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].content_details.video_id, "abc123");
        assert_eq!(parsed.next_page_token.as_deref(), Some("CAUQAA"));
    }

    #[test]
    fn video_details_tolerate_missing_statistics() {
        let json = r#"{
            "items": [{
                "id": "abc123",
                "contentDetails": {"duration": "PT1H"},
                "statistics": {}
            }]
        }"#;
        let parsed: VideoListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.items[0].statistics.view_count, None);
    }

    #[test]
    fn thumbnail_fallback_order() {
        let thumbs = Thumbnails {
            high: None,
            medium: Some(Thumbnail { url: "med".into() }),
            default: Some(Thumbnail { url: "def".into() }),
        };
        assert_eq!(thumbs.best_url().as_deref(), Some("med"));
    }
}
