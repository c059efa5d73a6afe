//! Unified cross-entity search.
//!
//! One query fans out to three independent result lists: a paginated
//! planner-backed video search, and fuzzy matches over the full speaker and
//! topic lists. The lists are not cross-filtered.

use serde::Serialize;

use crate::database::{Database, Speaker, Topic, VideoFilter, VideoPage};
use crate::error::AppError;
use crate::matching::fuzzy::fuzzy_search;
use crate::matching::normalize::strip_accents_lower;

/// The global search casts a wider net than admin-facing lookups: visitors
/// misspell names, so recall wins over precision.
const GLOBAL_SEARCH_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: i64,
    pub page: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 20, page: 1 }
    }
}

impl Pagination {
    fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit
    }
}

#[derive(Debug, Serialize)]
pub struct GlobalSearchResults {
    pub videos: VideoPage,
    pub speakers: Vec<Speaker>,
    pub topics: Vec<Topic>,
    pub query: String,
}

/// Search videos, speakers and topics for one free-text query.
///
/// A blank query returns three empty lists - not an error, and not the
/// whole catalog.
pub fn global_search(
    db: &Database,
    query: &str,
    pagination: Pagination,
) -> Result<GlobalSearchResults, AppError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Ok(GlobalSearchResults {
            videos: empty_page(pagination),
            speakers: Vec::new(),
            topics: Vec::new(),
            query: String::new(),
        });
    }

    let filter = VideoFilter {
        query: Some(trimmed.to_string()),
        sort_desc: true,
        limit: pagination.limit,
        offset: pagination.offset(),
        ..VideoFilter::default()
    };
    let (videos, total) = db.get_videos(&filter)?;
    let videos = VideoPage {
        has_more: filter.offset + (videos.len() as i64) < total,
        videos,
        total,
        limit: pagination.limit,
        offset: filter.offset,
    };

    let speakers = search_with_secondary(
        db.get_speakers()?,
        |s: &Speaker| s.name.as_str(),
        |s: &Speaker| s.bio.as_deref(),
        trimmed,
    );
    let topics = search_with_secondary(
        db.get_topics()?,
        |t: &Topic| t.name.as_str(),
        |t: &Topic| t.description.as_deref(),
        trimmed,
    );

    Ok(GlobalSearchResults { videos, speakers, topics, query: trimmed.to_string() })
}

/// Fuzzy-match on the name, then append records whose bio/description
/// contains the query (accent-insensitive) as a secondary signal. Fuzzy
/// order first; secondary hits keep their list order; no duplicates.
fn search_with_secondary<T, N, S>(items: Vec<T>, name_of: N, secondary_of: S, query: &str) -> Vec<T>
where
    T: Clone,
    N: Fn(&T) -> &str,
    S: Fn(&T) -> Option<&str>,
{
    let needle = strip_accents_lower(query);

    let secondary_hits: Vec<T> = items
        .iter()
        .filter(|item| {
            secondary_of(item)
                .map(|text| strip_accents_lower(text).contains(needle.as_str()))
                .unwrap_or(false)
        })
        .cloned()
        .collect();

    let mut results = fuzzy_search(items, |item| name_of(item), query, GLOBAL_SEARCH_THRESHOLD);

    for hit in secondary_hits {
        let name = name_of(&hit).to_string();
        if !results.iter().any(|r| name_of(r) == name) {
            results.push(hit);
        }
    }

    results
}

fn empty_page(pagination: Pagination) -> VideoPage {
    VideoPage {
        videos: Vec::new(),
        total: 0,
        limit: pagination.limit,
        offset: pagination.offset(),
        has_more: false,
    }
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

    fn seed(db: &Database) {
        let speaker = db
            .create_speaker(
                "François Mudioko",
                &slugify("François Mudioko"),
                Some("Pasteur et enseignant de la Parole"),
                None,
            )
            .unwrap();
        db.create_speaker("Paul Martin", "paul-martin", None, None).unwrap();
        let topic = db
            .create_topic("La Foi", "la-foi", Some("Enseignements sur la foi"), "#ff0000")
            .unwrap();

        let (video, _) = db
            .upsert_video(&NewVideo {
                youtube_id: "v1".to_string(),
                title: "15/01/2024 - Frère François Mudioko : La foi".to_string(),
                description: Some("Culte du dimanche".to_string()),
                thumbnail_url: None,
                published_at: Some("2024-01-15T10:00:00Z".to_string()),
                tags: vec!["foi".to_string()],
                duration_seconds: 3600,
                view_count: 100,
            })
            .unwrap();
        db.set_video_speaker(video, speaker).unwrap();
        db.set_video_topic(video, Some(topic)).unwrap();
    }

    #[test]
    fn blank_query_returns_empty_sets() {
        let (db, _tmp) = setup_test_db();
        seed(&db);
        let results = global_search(&db, "   ", Pagination::default()).unwrap();
        assert!(results.videos.videos.is_empty());
        assert_eq!(results.videos.total, 0);
        assert!(results.speakers.is_empty());
        assert!(results.topics.is_empty());
    }

    #[test]
    fn query_hits_all_three_lists() {
        let (db, _tmp) = setup_test_db();
        seed(&db);
        let results = global_search(&db, "foi", Pagination::default()).unwrap();
        assert_eq!(results.videos.videos.len(), 1);
        assert_eq!(results.topics.len(), 1);
        // "foi" is not a speaker name, but no error either
        assert!(results.speakers.is_empty());
    }

    #[test]
    fn misspelled_speaker_still_found() {
        let (db, _tmp) = setup_test_db();
        seed(&db);
        let results = global_search(&db, "francois mudioco", Pagination::default()).unwrap();
        assert_eq!(results.speakers.len(), 1);
        assert_eq!(results.speakers[0].name, "François Mudioko");
    }

    #[test]
    fn bio_containment_is_a_secondary_signal() {
        let (db, _tmp) = setup_test_db();
        seed(&db);
        let results = global_search(&db, "enseignant", Pagination::default()).unwrap();
        assert_eq!(results.speakers.len(), 1);
        assert_eq!(results.speakers[0].name, "François Mudioko");
    }

    #[test]
    fn date_query_finds_the_video() {
        let (db, _tmp) = setup_test_db();
        seed(&db);
        for query in ["15 - janvier 2024", "15-01-2024", "2024-01-15", "january 2024"] {
            let results = global_search(&db, query, Pagination::default()).unwrap();
            assert_eq!(results.videos.videos.len(), 1, "query {query:?}");
        }
    }

    #[test]
    fn pagination_is_respected() {
        let (db, _tmp) = setup_test_db();
        for i in 0..5 {
            db.upsert_video(&NewVideo {
                youtube_id: format!("v{i}"),
                title: format!("Culte numéro {i}"),
                description: None,
                thumbnail_url: None,
                published_at: Some(format!("2024-01-{:02}T10:00:00Z", i + 1)),
                tags: Vec::new(),
                duration_seconds: 0,
                view_count: 0,
            })
            .unwrap();
        }

        let page1 = global_search(&db, "culte", Pagination { limit: 2, page: 1 }).unwrap();
        assert_eq!(page1.videos.videos.len(), 2);
        assert_eq!(page1.videos.total, 5);
        assert!(page1.videos.has_more);
        // newest first
        assert_eq!(page1.videos.videos[0].youtube_id, "v4");

        let page3 = global_search(&db, "culte", Pagination { limit: 2, page: 3 }).unwrap();
        assert_eq!(page3.videos.videos.len(), 1);
        assert!(!page3.videos.has_more);
    }
}
