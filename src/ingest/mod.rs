//! Catalog ingestion from the video provider.
//!
//! Syncing is an at-least-once, per-item-independent batch: one video's
//! failure is logged and counted, never aborting the rest. Cancellation is
//! cooperative - the loop stops scheduling new items and lets the current
//! one finish.

pub mod provider;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::catalog::assign::auto_assign_speakers;
use crate::config::SyncConfig;
use crate::database::{Database, NewVideo};
use crate::error::AppError;
use provider::{PlaylistVideo, VideoDetails, YouTubeClient, DETAILS_BATCH_SIZE};

/// Summary of one sync run.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SyncReport {
    pub created: i64,
    pub updated: i64,
    pub errors: i64,
}

impl SyncReport {
    pub fn total(&self) -> i64 {
        self.created + self.updated
    }
}

static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").expect("hashtag pattern must compile"));

/// Pull every video of the configured channel into the catalog.
///
/// Walks the uploads playlist page by page, enriches each page with a
/// details batch (duration, view count) and upserts by `youtube_id`.
/// Returns the `{created, updated, errors}` report; partial progress is
/// kept on failure.
pub async fn sync_channel(
    db: &Database,
    client: &YouTubeClient,
    channel: &str,
    cancel: &CancellationToken,
) -> Result<SyncReport, AppError> {
    tracing::info!("Starting catalog sync for channel {}", channel);

    let resolved = client
        .resolve_channel(channel)
        .await
        .map_err(|e| AppError::Provider(e.to_string()))?;

    let mut report = SyncReport::default();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        if cancel.is_cancelled() {
            tracing::info!("Sync cancelled after {} page(s)", pages);
            break;
        }

        let (videos, next_token) = match client
            .playlist_page(&resolved.uploads_playlist_id, page_token.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) => {
                // Without a page there is no token to continue from; keep
                // what was already ingested and surface the failure count.
                tracing::error!("Failed to fetch playlist page: {}", e);
                report.errors += 1;
                break;
            }
        };
        pages += 1;

        let details = fetch_details(client, &videos).await;

        for video in &videos {
            if cancel.is_cancelled() {
                break;
            }
            match upsert_one(db, video, details.iter().find(|d| d.youtube_id == video.youtube_id)) {
                Ok(true) => report.created += 1,
                Ok(false) => report.updated += 1,
                Err(e) => {
                    tracing::error!("Failed to upsert video {}: {}", video.youtube_id, e);
                    report.errors += 1;
                }
            }
        }

        page_token = next_token;
        if page_token.is_none() {
            break;
        }
    }

    tracing::info!(
        "Sync finished: {} created, {} updated, {} error(s)",
        report.created,
        report.updated,
        report.errors
    );
    Ok(report)
}

/// Details for one playlist page. A failed details batch degrades to
/// zero-valued durations/view counts rather than dropping the page.
async fn fetch_details(client: &YouTubeClient, videos: &[PlaylistVideo]) -> Vec<VideoDetails> {
    let ids: Vec<String> = videos.iter().map(|v| v.youtube_id.clone()).collect();
    let mut details = Vec::with_capacity(ids.len());
    for batch in ids.chunks(DETAILS_BATCH_SIZE) {
        match client.video_details(batch).await {
            Ok(mut found) => details.append(&mut found),
            Err(e) => {
                tracing::warn!("Failed to fetch details for {} video(s): {}", batch.len(), e);
            }
        }
    }
    details
}

fn upsert_one(
    db: &Database,
    video: &PlaylistVideo,
    details: Option<&VideoDetails>,
) -> Result<bool, AppError> {
    let new_video = NewVideo {
        youtube_id: video.youtube_id.clone(),
        title: video.title.clone(),
        description: video.description.clone(),
        thumbnail_url: video.thumbnail_url.clone(),
        published_at: video.published_at.clone(),
        tags: extract_tags(video.description.as_deref().unwrap_or_default()),
        duration_seconds: details.map(|d| d.duration_seconds).unwrap_or(0),
        view_count: details.map(|d| d.view_count).unwrap_or(0),
    };
    let (_, is_new) = db.upsert_video(&new_video)?;
    Ok(is_new)
}

/// Lowercased `#hashtag` keywords found in a video description.
pub fn extract_tags(description: &str) -> Vec<String> {
    HASHTAG
        .captures_iter(description)
        .map(|caps| caps[1].to_lowercase())
        .collect()
}

/// Daily sync scheduler - runs the catalog sync (and, when configured, the
/// speaker auto-assignment sweep) at the configured local hour.
pub async fn run_scheduler(
    db: Arc<Database>,
    client: Arc<YouTubeClient>,
    channel: String,
    sync_config: SyncConfig,
    cancel: CancellationToken,
) {
    use chrono::Local;

    tracing::info!("Sync scheduler started (daily at {}:00)", sync_config.hour);

    loop {
        let now = Local::now();
        let today_target = now
            .date_naive()
            .and_hms_opt(sync_config.hour, 0, 0)
            .expect("validated sync hour");

        let next_run = if now.naive_local() < today_target {
            today_target
        } else {
            today_target + chrono::Duration::days(1)
        };

        let wait_duration = (next_run - now.naive_local())
            .to_std()
            .unwrap_or(Duration::from_secs(3600));

        tracing::info!(
            "Next catalog sync scheduled for {} (in {:.1} hours)",
            next_run.format("%Y-%m-%d %H:%M"),
            wait_duration.as_secs_f64() / 3600.0
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Sync scheduler stopped");
                return;
            }
            _ = tokio::time::sleep(wait_duration) => {}
        }

        match sync_channel(&db, &client, &channel, &cancel).await {
            Ok(report) => {
                tracing::info!(
                    "Scheduled sync: {} added, {} updated, {} error(s)",
                    report.created,
                    report.updated,
                    report.errors
                );
            }
            Err(e) => {
                tracing::error!("Scheduled sync failed: {}", e);
            }
        }

        if sync_config.auto_assign && !cancel.is_cancelled() {
            match auto_assign_speakers(&db, false, &cancel) {
                Ok(report) => {
                    tracing::info!(
                        "Assignment sweep: {} assigned ({} new speaker(s)), {} unmatched, {} error(s)",
                        report.assigned,
                        report.created,
                        report.no_match,
                        report.errors
                    );
                }
                Err(e) => {
                    tracing::error!("Assignment sweep failed: {}", e);
                }
            }
        }
    }
}
