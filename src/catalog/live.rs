//! Live-stream lookup behind the TTL cache.
//!
//! The front page asks "is the church live right now?" on every load;
//! answering from the provider each time would burn the API quota. The
//! cache collaborator answers from its slot while the entry is fresh.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::error::AppError;
use crate::ingest::provider::{LiveVideo, YouTubeClient};

pub struct LiveService {
    client: Arc<YouTubeClient>,
    channel_id: String,
    cache: TtlCache<Option<LiveVideo>>,
}

impl LiveService {
    pub fn new(client: Arc<YouTubeClient>, channel_id: String, ttl: Duration) -> Self {
        Self {
            client,
            channel_id,
            cache: TtlCache::new(ttl),
        }
    }

    /// The current live stream, or `None` when the channel is not live.
    /// Served from the cache within the TTL window.
    pub async fn current(&self) -> Result<Option<LiveVideo>, AppError> {
        self.cache
            .get_or_fetch(|| async {
                self.client
                    .live_video(&self.channel_id)
                    .await
                    .map_err(|e| AppError::Provider(e.to_string()))
            })
            .await
    }
}
