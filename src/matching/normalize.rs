//! Name normalization for comparison and slug generation.
//!
//! All functions here are total: empty or odd input yields an empty string,
//! never an error. `normalize_name` is idempotent, which the rest of the
//! matching stack relies on when it compares already-normalized forms.

use unicode_normalization::UnicodeNormalization;

/// Honorific tokens stripped from the front of a name before comparison.
/// "frere" covers the accent-stripped spelling so re-normalizing an already
/// normalized name is a no-op.
const HONORIFICS: &[&str] = &["brother", "frère", "frere", "fr", "br"];

/// Canonicalize a human name for comparison.
///
/// Pipeline: lowercase → strip leading honorific tokens ("Frère", "Br.", …)
/// → decompose and drop combining diacritics → drop everything that is not
/// a word character or whitespace → collapse whitespace.
///
/// `normalize_name(normalize_name(x)) == normalize_name(x)` for any input.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = strip_honorifics(lowered.trim());
    let folded = strip_diacritics(stripped);
    let cleaned: String = folded
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    collapse_whitespace(&cleaned)
}

/// Lowercase + diacritic folding + whitespace collapse, keeping punctuation.
///
/// This is the folding applied to search needles and haystacks: date queries
/// like "15/01/2024" must survive it, so `/` and `-` are preserved (unlike
/// `normalize_name`, which erases them).
pub fn strip_accents_lower(text: &str) -> String {
    collapse_whitespace(&strip_diacritics(&text.to_lowercase()))
}

/// Build a URL-safe slug from a display name: lowercase, accents stripped,
/// non-alphanumeric runs turned into single hyphens.
pub fn slugify(name: &str) -> String {
    let folded = strip_diacritics(&name.to_lowercase());
    let mut slug = String::with_capacity(folded.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen
    for c in folded.chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Drop leading honorific tokens until none remains, so doubled prefixes
/// ("Brother Brother John") normalize to the same fixed point in one call.
fn strip_honorifics(name: &str) -> &str {
    let mut rest = name;
    loop {
        let Some(token) = rest.split_whitespace().next() else {
            return rest;
        };
        let bare = token.strip_suffix('.').unwrap_or(token);
        if !HONORIFICS.contains(&bare) {
            return rest;
        }
        rest = rest[token.len()..].trim_start();
        if rest.is_empty() {
            return rest;
        }
    }
}

/// NFD-decompose and remove combining marks ("é" → "e").
fn strip_diacritics(text: &str) -> String {
    text.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
