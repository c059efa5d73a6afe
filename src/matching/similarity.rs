//! Similarity scoring between two human names.

use crate::matching::normalize::normalize_name;

/// Score assigned when one normalized name contains the other.
const SUBSTRING_SCORE: f64 = 0.8;

/// Score assigned when two multi-word names share at least two significant
/// tokens (handles reordered names like "Mudioko François").
const WORD_SET_SCORE: f64 = 0.85;

/// Similarity between two names, in [0, 1].
///
/// 1.0 for an exact normalized match, 0.8 when one normalized form contains
/// the other, 0.85 when the names share at least two significant words
/// (regardless of order), otherwise `1 - levenshtein / longer_len`.
///
/// Symmetric, and `similarity(x, x) == 1.0` for any x.
pub fn similarity(a: &str, b: &str) -> f64 {
    let s1 = normalize_name(a);
    let s2 = normalize_name(b);

    if s1 == s2 {
        return 1.0;
    }
    if s1.contains(s2.as_str()) || s2.contains(s1.as_str()) {
        return SUBSTRING_SCORE;
    }

    let words1 = significant_tokens(&s1);
    let words2 = significant_tokens(&s2);
    if words1.len() >= 2 && words2.len() >= 2 && shared_token_count(&words1, &words2) >= 2 {
        return WORD_SET_SCORE;
    }

    let longer_len = s1.chars().count().max(s2.chars().count());
    if longer_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(&s1, &s2);
    (1.0 - distance as f64 / longer_len as f64).max(0.0)
}

/// Whitespace tokens longer than two characters, sorted.
fn significant_tokens(name: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = name.split_whitespace().filter(|w| w.len() > 2).collect();
    tokens.sort_unstable();
    tokens
}

/// Count tokens of `a` matched in `b`. A pair counts as shared when the
/// tokens are equal or one contains the other, so a truncated "fran" still
/// matches "francois".
fn shared_token_count(a: &[&str], b: &[&str]) -> usize {
    a.iter()
        .filter(|w| b.iter().any(|o| o == *w || o.contains(**w) || w.contains(*o)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_one() {
        assert_eq!(similarity("Jean Dupont", "Jean Dupont"), 1.0);
        assert_eq!(similarity("x", "x"), 1.0);
    }

    #[test]
    fn accent_variants_are_exact() {
        assert_eq!(similarity("François", "francois"), 1.0);
        assert_eq!(similarity("Frère Jean", "jean"), 1.0);
    }

    #[test]
    fn empty_inputs_are_exact() {
        // Both normalize to the empty string
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("...", "  "), 1.0);
    }

    #[test]
    fn substring_scores_point_eight() {
        assert_eq!(similarity("Jean Dupont", "Dupont"), SUBSTRING_SCORE);
        assert_eq!(similarity("Dupont", "Jean Dupont"), SUBSTRING_SCORE);
    }

    #[test]
    fn reordered_names_score_word_set() {
        assert!(similarity("François Mudioko", "Mudioko François") >= WORD_SET_SCORE);
    }

    #[test]
    fn truncated_token_still_shares() {
        // "fran" is contained in "francois": two shared tokens in total
        assert_eq!(similarity("François Mudioko", "Mudioko Fran"), WORD_SET_SCORE);
    }

    #[test]
    fn unrelated_names_score_low() {
        assert!(similarity("Jean Dupont", "Paul Martin") < 0.5);
    }

    #[test]
    fn symmetric() {
        let pairs = [
            ("François Mudioko", "Mudioko Fran"),
            ("Jean Dupont", "Paul Martin"),
            ("Dupont", "Jean Dupont"),
            ("", "Jean"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a), "asymmetric for {a:?}/{b:?}");
        }
    }

    #[test]
    fn close_spellings_score_by_edit_distance() {
        // "dupond" vs "dupont": distance 1 over length 6
        let score = similarity("Dupond", "Dupont");
        assert!((score - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn never_negative() {
        assert!(similarity("ab", "xyzw") >= 0.0);
    }
}
