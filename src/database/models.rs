use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub background_images: Vec<String>,
    pub video_count: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: String,
    pub video_count: i64,
    pub created_at: Option<String>,
}

/// A speaker as joined onto a video row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub photo_url: Option<String>,
}

/// A topic as joined onto a video row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRef {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: i64,
    pub youtube_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<String>,
    pub tags: Vec<String>,
    pub duration_seconds: i64,
    pub view_count: i64,
    pub speaker: Option<SpeakerRef>,
    pub topic: Option<TopicRef>,
}

/// Input for the ingestion upsert, keyed by `youtube_id`.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub youtube_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<String>,
    pub tags: Vec<String>,
    pub duration_seconds: i64,
    pub view_count: i64,
}

/// Filters and pagination for the video catalog listing.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    pub speaker_id: Option<i64>,
    pub topic_id: Option<i64>,
    /// Free-text query run through the search planner.
    pub query: Option<String>,
    /// Newest first when true (the default for every catalog surface).
    pub sort_desc: bool,
    pub limit: i64,
    pub offset: i64,
}

impl VideoFilter {
    pub fn latest(limit: i64, offset: i64) -> Self {
        Self { sort_desc: true, limit, offset, ..Self::default() }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

/// Outcome of merging one duplicate speaker into its keeper.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MergeOutcome {
    pub videos_moved: i64,
}
