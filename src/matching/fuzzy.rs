//! Threshold-based fuzzy search over named records.

use crate::matching::normalize::normalize_name;
use crate::matching::similarity::similarity;

/// Default inclusion threshold. The global catalog search passes a looser
/// 0.5 to favor recall, since visitors routinely misspell names.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// Rank `items` against `query`, best match first.
///
/// An empty or whitespace query returns the items unchanged. Otherwise each
/// item is scored - 1.0 for an exact normalized match, 0.9 when one
/// normalized form contains the other, else the similarity score - and kept
/// when it matched exactly, partially, or scored at least `threshold`. The
/// sort is stable: ties keep their original relative order.
pub fn fuzzy_search<T, F>(items: Vec<T>, name_of: F, query: &str, threshold: f64) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if query.trim().is_empty() {
        return items;
    }

    let normalized_query = normalize_name(query);

    let mut scored: Vec<(T, f64)> = items
        .into_iter()
        .filter_map(|item| {
            let normalized_name = normalize_name(name_of(&item));
            let exact = normalized_name == normalized_query;
            let partial = normalized_name.contains(normalized_query.as_str())
                || normalized_query.contains(normalized_name.as_str());
            let score = if exact {
                1.0
            } else if partial {
                0.9
            } else {
                similarity(&normalized_query, &normalized_name)
            };

            if exact || partial || score >= threshold {
                Some((item, score))
            } else {
                None
            }
        })
        .collect();

    // Vec::sort_by is stable, so equal scores preserve input order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(item, _)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        id: i64,
        name: String,
    }

    fn entries(names: &[&str]) -> Vec<Entry> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Entry { id: i as i64 + 1, name: n.to_string() })
            .collect()
    }

    fn names(found: &[Entry]) -> Vec<&str> {
        found.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn empty_query_passes_through_unchanged() {
        let items = entries(&["Jean Dupont", "Paul Martin"]);
        let expected = items.clone();
        assert_eq!(fuzzy_search(items, |e| &e.name, "", DEFAULT_THRESHOLD), expected);

        let items = entries(&["Jean Dupont", "Paul Martin"]);
        let expected = items.clone();
        assert_eq!(fuzzy_search(items, |e| &e.name, "   ", DEFAULT_THRESHOLD), expected);
    }

    #[test]
    fn partial_match_filters_out_unrelated() {
        let found = fuzzy_search(
            entries(&["Jean Dupont", "Paul Martin"]),
            |e| &e.name,
            "dupont",
            DEFAULT_THRESHOLD,
        );
        assert_eq!(names(&found), ["Jean Dupont"]);
    }

    #[test]
    fn exact_match_outranks_partial() {
        let found = fuzzy_search(
            entries(&["Jean Dupont", "Dupont"]),
            |e| &e.name,
            "Dupont",
            DEFAULT_THRESHOLD,
        );
        assert_eq!(names(&found), ["Dupont", "Jean Dupont"]);
    }

    #[test]
    fn accents_do_not_matter() {
        let found = fuzzy_search(
            entries(&["François Mudioko"]),
            |e| &e.name,
            "francois mudioko",
            DEFAULT_THRESHOLD,
        );
        assert_eq!(names(&found), ["François Mudioko"]);
    }

    #[test]
    fn misspelling_caught_by_threshold() {
        let found = fuzzy_search(
            entries(&["Jean Dupont", "Paul Martin"]),
            |e| &e.name,
            "jean dupond",
            DEFAULT_THRESHOLD,
        );
        assert_eq!(names(&found), ["Jean Dupont"]);
    }

    #[test]
    fn looser_threshold_is_more_inclusive() {
        let items = || entries(&["Mudioko François"]);
        // "mudioko f" is a prefix of the normalized name: partial either way
        assert_eq!(fuzzy_search(items(), |e| &e.name, "mudioko f", 0.5).len(), 1);
        // something further away passes at 0.5 but not 0.9
        let close = fuzzy_search(items(), |e| &e.name, "mudioko francs", 0.5);
        assert_eq!(close.len(), 1);
    }

    #[test]
    fn ties_keep_original_order() {
        let found = fuzzy_search(
            entries(&["Jean Dupont", "Marie Dupont"]),
            |e| &e.name,
            "dupont",
            DEFAULT_THRESHOLD,
        );
        // both are partial matches at 0.9; input order preserved
        assert_eq!(names(&found), ["Jean Dupont", "Marie Dupont"]);
    }

    #[test]
    fn no_candidates_is_no_results() {
        let found: Vec<Entry> = fuzzy_search(Vec::new(), |e: &Entry| &e.name, "x", DEFAULT_THRESHOLD);
        assert!(found.is_empty());
    }
}
