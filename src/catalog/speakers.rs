//! Speaker entity resolution: find-or-create, rename, merge, and the
//! duplicate cleanup sweep.

use serde::Serialize;
use std::collections::HashMap;

use crate::database::{Database, MergeOutcome, Speaker};
use crate::error::AppError;
use crate::matching::dedupe::{choose_keeper, find_duplicate_groups};
use crate::matching::normalize::{normalize_name, slugify};

/// Resolve an extracted name to a speaker id, creating the record when
/// nothing matches. Returns the id and whether a new speaker was created.
///
/// `cache` is batch-scoped: the assignment sweep passes one map per run so
/// repeated titles by the same speaker hit the store once.
pub fn find_or_create_speaker(
    db: &Database,
    name: &str,
    cache: &mut HashMap<String, i64>,
) -> Result<(i64, bool), AppError> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return Err(AppError::Validation(format!(
            "speaker name {name:?} normalizes to nothing"
        )));
    }

    if let Some(&id) = cache.get(&normalized) {
        return Ok((id, false));
    }

    let speakers = db.get_speakers()?;

    // Exact normalized match first, then containment so a partial name
    // like "Mudioko" still finds "François Mudioko".
    let found = speakers
        .iter()
        .find(|s| normalize_name(&s.name) == normalized)
        .or_else(|| {
            speakers.iter().find(|s| {
                let other = normalize_name(&s.name);
                other.contains(normalized.as_str()) || normalized.contains(other.as_str())
            })
        });

    if let Some(speaker) = found {
        cache.insert(normalized, speaker.id);
        return Ok((speaker.id, false));
    }

    let slug = slugify(name);
    // A distinct display name can still collide on the slug; reuse the
    // existing record instead of failing the UNIQUE constraint.
    if let Some(existing) = db.get_speaker_by_slug(&slug)? {
        cache.insert(normalized, existing.id);
        return Ok((existing.id, false));
    }

    let id = db.create_speaker(name, &slug, None, None)?;
    tracing::info!("Created speaker {:?} (id {})", name, id);
    cache.insert(normalized, id);
    Ok((id, true))
}

/// Resolve a display name to exactly one speaker.
///
/// Zero matches is `NotFound`; several equally-exact matches is
/// `Ambiguous` and the caller must disambiguate (by id) - never pick one
/// silently.
pub fn resolve_speaker_by_name(db: &Database, name: &str) -> Result<Speaker, AppError> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return Err(AppError::Validation(format!("speaker name {name:?} is empty")));
    }

    let mut matches: Vec<Speaker> = db
        .get_speakers()?
        .into_iter()
        .filter(|s| normalize_name(&s.name) == normalized)
        .collect();

    match matches.len() {
        0 => Err(AppError::NotFound(format!("no speaker named {name:?}"))),
        1 => Ok(matches.remove(0)),
        _ => {
            let candidates: Vec<String> = matches
                .iter()
                .map(|s| format!("{} (id {})", s.name, s.id))
                .collect();
            Err(AppError::Ambiguous(format!(
                "{name:?} matches several speakers: {}",
                candidates.join(", ")
            )))
        }
    }
}

/// Rename a speaker, regenerating its slug.
pub fn rename_speaker(db: &Database, id: i64, new_name: &str) -> Result<Speaker, AppError> {
    if normalize_name(new_name).is_empty() {
        return Err(AppError::Validation(format!("speaker name {new_name:?} is empty")));
    }
    let speaker = db
        .get_speaker_by_id(id)?
        .ok_or_else(|| AppError::NotFound(format!("speaker {id}")))?;

    db.update_speaker(
        id,
        new_name,
        &slugify(new_name),
        speaker.bio.as_deref(),
        speaker.photo_url.as_deref(),
    )?;
    db.get_speaker_by_id(id)?
        .ok_or_else(|| AppError::NotFound(format!("speaker {id}")))
}

/// Merge one speaker into another. Re-points the source's videos, deletes
/// the source, and returns the updated keeper. Merging an already-merged
/// source surfaces as `NotFound` (state is unchanged - the operation is
/// idempotent).
pub fn merge_speakers(db: &Database, keeper_id: i64, source_id: i64) -> Result<Speaker, AppError> {
    let outcome = db
        .merge_speakers(keeper_id, source_id)?
        .ok_or_else(|| AppError::NotFound(format!("speaker {source_id} (already merged?)")))?;

    tracing::info!(
        "Merged speaker {} into {} ({} video(s) moved)",
        source_id,
        keeper_id,
        outcome.videos_moved
    );

    db.get_speaker_by_id(keeper_id)?
        .ok_or_else(|| AppError::NotFound(format!("speaker {keeper_id}")))
}

/// One planned (or executed) duplicate-group merge.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroupPlan {
    pub keeper_id: i64,
    pub keeper_name: String,
    pub duplicate_ids: Vec<i64>,
    pub duplicate_names: Vec<String>,
}

/// Summary of a duplicate cleanup sweep.
#[derive(Debug, Default, Serialize)]
pub struct DedupeReport {
    pub groups: Vec<DuplicateGroupPlan>,
    pub merged: i64,
    pub videos_moved: i64,
    pub errors: i64,
}

/// Find duplicate speaker groups and merge each into its keeper.
///
/// Merges within a run happen serially: a source must be gone before the
/// next merge starts, so a re-point can never race a delete. With
/// `dry_run` the report lists what would be merged without writing.
pub fn clean_duplicates(db: &Database, dry_run: bool) -> Result<DedupeReport, AppError> {
    let speakers = db.get_speakers()?;
    let mut report = DedupeReport::default();

    for group in find_duplicate_groups(&speakers) {
        let Some(keeper) = choose_keeper(&group) else {
            continue;
        };
        let plan = DuplicateGroupPlan {
            keeper_id: keeper.id,
            keeper_name: keeper.name.clone(),
            duplicate_ids: group.iter().filter(|s| s.id != keeper.id).map(|s| s.id).collect(),
            duplicate_names: group
                .iter()
                .filter(|s| s.id != keeper.id)
                .map(|s| s.name.clone())
                .collect(),
        };
        report.groups.push(plan);
    }

    if dry_run {
        return Ok(report);
    }

    for group in &report.groups {
        for &source_id in &group.duplicate_ids {
            match db.merge_speakers(group.keeper_id, source_id) {
                Ok(Some(MergeOutcome { videos_moved })) => {
                    report.merged += 1;
                    report.videos_moved += videos_moved;
                }
                Ok(None) => {
                    tracing::warn!("Speaker {} vanished before its merge; skipping", source_id);
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to merge speaker {} into {}: {}",
                        source_id,
                        group.keeper_id,
                        e
                    );
                    report.errors += 1;
                }
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
        (db, temp_dir)
    }

    fn add_speaker(db: &Database, name: &str) -> i64 {
        db.create_speaker(name, &slugify(name), None, None).unwrap()
    }

    fn add_video(db: &Database, youtube_id: &str, title: &str, speaker_id: Option<i64>) -> i64 {
        let (id, _) = db
            .upsert_video(&crate::database::NewVideo {
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
        if let Some(speaker_id) = speaker_id {
            db.set_video_speaker(id, speaker_id).unwrap();
        }
        id
    }

    #[test]
    fn find_or_create_reuses_name_variants() {
        let (db, _tmp) = setup_test_db();
        let id = add_speaker(&db, "François Mudioko");
        let mut cache = HashMap::new();

        let (found, created) =
            find_or_create_speaker(&db, "Frère François Mudioko", &mut cache).unwrap();
        assert_eq!(found, id);
        assert!(!created);

        // containment fallback
        let (found, created) = find_or_create_speaker(&db, "Mudioko", &mut cache).unwrap();
        assert_eq!(found, id);
        assert!(!created);
    }

    #[test]
    fn find_or_create_creates_when_nothing_matches() {
        let (db, _tmp) = setup_test_db();
        let mut cache = HashMap::new();
        let (id, created) = find_or_create_speaker(&db, "Paul Martin", &mut cache).unwrap();
        assert!(created);
        let speaker = db.get_speaker_by_id(id).unwrap().unwrap();
        assert_eq!(speaker.slug, "paul-martin");

        // second call hits the batch cache
        let (again, created) = find_or_create_speaker(&db, "Paul Martin", &mut cache).unwrap();
        assert_eq!(again, id);
        assert!(!created);
    }

    #[test]
    fn find_or_create_rejects_empty_names() {
        let (db, _tmp) = setup_test_db();
        let mut cache = HashMap::new();
        assert!(matches!(
            find_or_create_speaker(&db, "Frère", &mut cache),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn resolve_by_name_surfaces_ambiguity() {
        let (db, _tmp) = setup_test_db();
        add_speaker(&db, "Jean Dupont");
        db.create_speaker("Frère Jean Dupont", "frere-jean-dupont", None, None)
            .unwrap();

        assert!(matches!(
            resolve_speaker_by_name(&db, "jean dupont"),
            Err(AppError::Ambiguous(_))
        ));
        assert!(matches!(
            resolve_speaker_by_name(&db, "Inconnu"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn merge_moves_videos_and_is_idempotent() {
        let (db, _tmp) = setup_test_db();
        let keeper = add_speaker(&db, "François Mudioko");
        let source = add_speaker(&db, "Mudioko Fran");
        add_video(&db, "v1", "Culte 1", Some(keeper));
        add_video(&db, "v2", "Culte 2", Some(source));
        add_video(&db, "v3", "Culte 3", Some(source));

        let merged = merge_speakers(&db, keeper, source).unwrap();
        assert_eq!(merged.video_count, 3);
        assert!(db.get_speaker_by_id(source).unwrap().is_none());

        // second merge of the same pair: NotFound, state unchanged
        assert!(matches!(
            merge_speakers(&db, keeper, source),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(db.count_videos_for_speaker(keeper).unwrap(), 3);
    }

    #[test]
    fn clean_duplicates_end_to_end() {
        let (db, _tmp) = setup_test_db();
        let francois = add_speaker(&db, "François Mudioko");
        let fran = add_speaker(&db, "Mudioko Fran");
        let paul = add_speaker(&db, "Paul Martin");
        for i in 0..10 {
            add_video(&db, &format!("f{i}"), "Culte", Some(francois));
        }
        for i in 0..2 {
            add_video(&db, &format!("d{i}"), "Culte", Some(fran));
        }
        for i in 0..5 {
            add_video(&db, &format!("p{i}"), "Culte", Some(paul));
        }

        // dry run only plans
        let plan = clean_duplicates(&db, true).unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].keeper_name, "François Mudioko");
        assert_eq!(plan.merged, 0);
        assert!(db.get_speaker_by_id(fran).unwrap().is_some());

        // real run merges
        let report = clean_duplicates(&db, false).unwrap();
        assert_eq!(report.merged, 1);
        assert_eq!(report.videos_moved, 2);
        assert_eq!(report.errors, 0);
        assert!(db.get_speaker_by_id(fran).unwrap().is_none());
        assert_eq!(db.count_videos_for_speaker(francois).unwrap(), 12);
        assert_eq!(db.count_videos_for_speaker(paul).unwrap(), 5);
    }

    #[test]
    fn rename_regenerates_slug() {
        let (db, _tmp) = setup_test_db();
        let id = add_speaker(&db, "Jean Dupond");
        let renamed = rename_speaker(&db, id, "Jean Dupont").unwrap();
        assert_eq!(renamed.name, "Jean Dupont");
        assert_eq!(renamed.slug, "jean-dupont");
    }
}
