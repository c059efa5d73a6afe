//! Speaker auto-assignment sweep.
//!
//! Walks the videos that have no speaker, extracts a candidate name from
//! each title and links (or creates) the matching speaker record. The sweep
//! is per-item independent - failures are counted, never fatal - and
//! cancellation-cooperative.

use serde::Serialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::catalog::speakers::find_or_create_speaker;
use crate::database::Database;
use crate::error::AppError;
use crate::matching::extract::extract_speaker_name;

/// Summary of one assignment sweep.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AssignReport {
    pub scanned: i64,
    pub assigned: i64,
    /// Speakers created because no existing record matched.
    pub created: i64,
    /// Titles with no detectable speaker name (an expected outcome).
    pub no_match: i64,
    pub errors: i64,
}

/// Assign speakers to every unassigned video whose title names one.
///
/// With `dry_run` the sweep resolves and counts but writes nothing. The
/// name→speaker cache lives for exactly one sweep, so a batch of titles by
/// the same speaker costs one store lookup.
pub fn auto_assign_speakers(
    db: &Database,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<AssignReport, AppError> {
    let unassigned = db.get_unassigned_videos()?;
    tracing::info!("{} video(s) without a speaker", unassigned.len());

    let mut report = AssignReport::default();
    let mut cache: HashMap<String, i64> = HashMap::new();

    for (video_id, title) in unassigned {
        if cancel.is_cancelled() {
            tracing::info!("Assignment sweep cancelled after {} video(s)", report.scanned);
            break;
        }
        report.scanned += 1;

        let Some(name) = extract_speaker_name(&title) else {
            report.no_match += 1;
            continue;
        };

        match assign_one(db, video_id, &name, dry_run, &mut cache) {
            Ok(created) => {
                report.assigned += 1;
                if created {
                    report.created += 1;
                }
            }
            Err(e) => {
                tracing::error!("Failed to assign video {}: {}", video_id, e);
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        "Assignment sweep{}: {} assigned ({} new speaker(s)), {} unmatched, {} error(s)",
        if dry_run { " (dry run)" } else { "" },
        report.assigned,
        report.created,
        report.no_match,
        report.errors
    );
    Ok(report)
}

fn assign_one(
    db: &Database,
    video_id: i64,
    name: &str,
    dry_run: bool,
    cache: &mut HashMap<String, i64>,
) -> Result<bool, AppError> {
    if dry_run {
        // Resolve without creating so a dry run stays side-effect free. The
        // sentinel keeps a repeated new name from counting as created twice.
        let normalized = crate::matching::normalize::normalize_name(name);
        let exists = cache.contains_key(&normalized)
            || db
                .get_speakers()?
                .iter()
                .any(|s| crate::matching::normalize::normalize_name(&s.name) == normalized);
        cache.insert(normalized, -1);
        return Ok(!exists);
    }

    let (speaker_id, created) = find_or_create_speaker(db, name, cache)?;
    db.set_video_speaker(video_id, speaker_id)?;
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewVideo;
    use crate::matching::normalize::slugify;
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
        (db, temp_dir)
    }

    fn add_video(db: &Database, youtube_id: &str, title: &str) -> i64 {
        let (id, _) = db
            .upsert_video(&NewVideo {
                youtube_id: youtube_id.to_string(),
                title: title.to_string(),
                description: None,
                thumbnail_url: None,
                published_at: Some("2024-01-15T10:00:00Z".to_string()),
                tags: Vec::new(),
                duration_seconds: 0,
                view_count: 0,
            })
            .unwrap();
        id
    }

    #[test]
    fn sweep_links_and_creates_speakers() {
        let (db, _tmp) = setup_test_db();
        let existing = db
            .create_speaker("Jean Dupont", &slugify("Jean Dupont"), None, None)
            .unwrap();
        let v1 = add_video(&db, "v1", "15/01/2024 - Frère Jean Dupont : La foi");
        let v2 = add_video(&db, "v2", "Frère Paul Martin - L'espérance");
        let v3 = add_video(&db, "v3", "réunion de prière du soir");

        let report = auto_assign_speakers(&db, false, &CancellationToken::new()).unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.assigned, 2);
        assert_eq!(report.created, 1);
        assert_eq!(report.no_match, 1);
        assert_eq!(report.errors, 0);

        let video = db.get_video_by_id(v1).unwrap().unwrap();
        assert_eq!(video.speaker.unwrap().id, existing);
        assert!(db.get_video_by_id(v2).unwrap().unwrap().speaker.is_some());
        assert!(db.get_video_by_id(v3).unwrap().unwrap().speaker.is_none());
    }

    #[test]
    fn repeated_titles_reuse_the_batch_cache() {
        let (db, _tmp) = setup_test_db();
        for i in 0..5 {
            add_video(&db, &format!("v{i}"), "Frère Paul Martin : message");
        }

        let report = auto_assign_speakers(&db, false, &CancellationToken::new()).unwrap();
        assert_eq!(report.assigned, 5);
        // one new speaker, not five
        assert_eq!(report.created, 1);
        assert_eq!(db.get_speakers().unwrap().len(), 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (db, _tmp) = setup_test_db();
        add_video(&db, "v1", "Frère Paul Martin : message");

        let report = auto_assign_speakers(&db, true, &CancellationToken::new()).unwrap();
        assert_eq!(report.assigned, 1);
        assert_eq!(report.created, 1);
        assert!(db.get_speakers().unwrap().is_empty());
        assert!(db.get_video_by_id(1).unwrap().unwrap().speaker.is_none());
    }

    #[test]
    fn cancelled_sweep_stops_early() {
        let (db, _tmp) = setup_test_db();
        add_video(&db, "v1", "Frère Paul Martin : message");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = auto_assign_speakers(&db, false, &cancel).unwrap();
        assert_eq!(report.scanned, 0);
        assert_eq!(report.assigned, 0);
    }
}
