//! Speaker-name extraction from free-text video titles.
//!
//! A small rule-based classifier: an ordered list of patterns tried in
//! priority order, first match wins. Prefixed forms ("Frère X", "- Br. X",
//! "Brother X :") are preferred; a bare capitalized-word pair is the
//! low-precision fallback. `None` is the expected "no speaker detected"
//! outcome, not a failure.

use once_cell::sync::Lazy;
use regex::Regex;

/// A capitalized word, optionally followed by up to three more (accents
/// included), e.g. "Jean", "Jean Dupont", "Jean De La Croix".
const NAME_SEQ: &str = r"\p{Lu}\p{Ll}+(?:\s+\p{Lu}\p{Ll}+){0,3}";

/// Patterns tried in priority order. Case-sensitive on purpose: the
/// honorific and the name are expected in title case.
static SPEAKER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "Frère Nom Prénom" / "Brother Name" anywhere in the title
        format!(r"(?:Frère|Fr|Brother|Br)\.?\s+({NAME_SEQ})"),
        // Same, immediately after a "|" or "-" separator
        format!(r"[|\-]\s*(?:Frère|Fr|Brother|Br)\.?\s+({NAME_SEQ})"),
        // Same, followed by a terminator or the end of the title
        format!(r"(?:Frère|Fr|Brother|Br)\.?\s+({NAME_SEQ})(?:\s*[,:\-]|$)"),
        // Fallback: two consecutive capitalized words, no honorific
        format!(r"\b(\p{{Lu}}\p{{Ll}}+\s+\p{{Lu}}\p{{Ll}}+)\b"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("speaker pattern must compile"))
    .collect()
});

/// Validates a cleaned candidate: starts with a capital letter, then
/// letters and spaces only.
static VALID_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{Lu}[\p{L}\s]+$").expect("name validator must compile"));

/// Extract a probable speaker name from a video title.
///
/// Returns the name in title case, or `None` when no pattern yields a
/// valid candidate.
pub fn extract_speaker_name(title: &str) -> Option<String> {
    if title.is_empty() {
        return None;
    }

    for pattern in SPEAKER_PATTERNS.iter() {
        let Some(captures) = pattern.captures(title) else {
            continue;
        };
        let Some(raw) = captures.get(1) else {
            continue;
        };
        if let Some(name) = clean_and_validate(raw.as_str()) {
            return Some(name);
        }
    }

    None
}

/// Strip separator prefixes and terminator tails from a captured group,
/// then validate and title-case it.
fn clean_and_validate(raw: &str) -> Option<String> {
    let mut name = raw.trim();
    name = name.trim_start_matches(['|', '-', ' ']);
    if let Some(pos) = name.find([',', ':', '-']) {
        name = &name[..pos];
    }
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");

    if name.chars().count() >= 3 && VALID_NAME.is_match(&name) {
        Some(title_case(&name))
    } else {
        None
    }
}

/// First letter of each word uppercased, the rest lowercased.
fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
