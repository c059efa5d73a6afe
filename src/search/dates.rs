//! Date renderings and date-query normalization.
//!
//! Visitors type dates in whatever shape comes to mind - "15/01/2024",
//! "15 janvier 2024", "january 2024", even "15 et janvier 2024". Search
//! matches them by rendering each video's publish date into every
//! human-readable form we support, and by expanding the query into the
//! variants those renderings could appear as.

use chrono::{DateTime, Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::matching::normalize::strip_accents_lower;

/// Month names, unaccented, as they appear after accent folding.
const FRENCH_MONTHS: [&str; 12] = [
    "janvier", "fevrier", "mars", "avril", "mai", "juin",
    "juillet", "aout", "septembre", "octobre", "novembre", "decembre",
];

const ENGLISH_MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

static FRENCH_MONTH_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(janvier|fevrier|mars|avril|mai|juin|juillet|aout|septembre|octobre|novembre|decembre)\b",
    )
    .expect("french month pattern must compile")
});

static DAY_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[\s/.-]+(\d{1,2})[\s/.-]+(\d{4})$").unwrap());
static YEAR_MONTH_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[\s/.-]+(\d{1,2})[\s/.-]+(\d{1,2})$").unwrap());
static MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[\s/.-]+(\d{4})$").unwrap());

/// All folded human-readable renderings of a publish date, one per line.
///
/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` strings (the two shapes
/// the store holds); anything unparseable renders as an empty string so the
/// surrounding LIKE simply never matches.
pub fn date_renderings(published_at: &str) -> String {
    let Some(date) = parse_stored_date(published_at) else {
        return String::new();
    };

    let day = date.day();
    let month = date.month();
    let year = date.year();
    let month_fr = FRENCH_MONTHS[(month - 1) as usize];
    let month_en = ENGLISH_MONTHS[(month - 1) as usize];

    [
        format!("{day:02}/{month:02}/{year}"),
        format!("{year}-{month:02}-{day:02}"),
        format!("{day:02}-{month:02}-{year}"),
        format!("{day} {month_fr} {year}"),
        format!("{day} {month_en} {year}"),
        format!("{month_fr} {year}"),
        format!("{month_en} {year}"),
        format!("{year}"),
        format!("{month:02}/{year}"),
        format!("{month:02}-{year}"),
        month_fr.to_string(),
        month_en.to_string(),
    ]
    .join("\n")
}

/// Expand a folded search query into every date-shaped variant worth
/// matching against the renderings.
///
/// The literal query is always the first variant. On top of it:
/// the word "et" dropped as a component separator, French month names
/// translated to English, `-`/`/` separators retried as spaces, and fully
/// numeric day/month/year (or month/year) shapes re-emitted zero-padded in
/// the slash, dash and ISO orderings.
pub fn query_variants(query: &str) -> Vec<String> {
    let base = strip_accents_lower(query);
    if base.is_empty() {
        return Vec::new();
    }

    let mut variants: Vec<String> = Vec::new();
    push_unique(&mut variants, base.clone());

    let without_et: String = base
        .split_whitespace()
        .filter(|token| *token != "et")
        .collect::<Vec<_>>()
        .join(" ");
    push_unique(&mut variants, without_et);

    // French months → English, on everything gathered so far
    for i in 0..variants.len() {
        let translated = translate_french_months(&variants[i]);
        push_unique(&mut variants, translated);
    }

    // Separators retried as plain spaces ("15 - janvier 2024" → "15 janvier 2024")
    for i in 0..variants.len() {
        let spaced = variants[i]
            .replace(['-', '/'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        push_unique(&mut variants, spaced);
    }

    // Zero-padded numeric forms ("15 - 1 2024" → "15-01-2024" & friends)
    for i in 0..variants.len() {
        for padded in padded_numeric_forms(&variants[i]) {
            push_unique(&mut variants, padded);
        }
    }

    variants
}

fn push_unique(variants: &mut Vec<String>, candidate: String) {
    if !candidate.is_empty() && !variants.iter().any(|v| *v == candidate) {
        variants.push(candidate);
    }
}

fn translate_french_months(text: &str) -> String {
    FRENCH_MONTH_WORD
        .replace_all(text, |caps: &regex::Captures| {
            let idx = FRENCH_MONTHS
                .iter()
                .position(|m| *m == &caps[1])
                .expect("captured month is in the table");
            ENGLISH_MONTHS[idx]
        })
        .into_owned()
}

/// Re-emit a fully numeric date query in the padded shapes the renderings
/// use. Returns nothing when the text is not a bare numeric date.
fn padded_numeric_forms(text: &str) -> Vec<String> {
    if let Some(caps) = DAY_MONTH_YEAR.captures(text) {
        let (day, month, year) = (&caps[1], &caps[2], &caps[3]);
        return numeric_renderings(day, month, year);
    }
    if let Some(caps) = YEAR_MONTH_DAY.captures(text) {
        let (year, month, day) = (&caps[1], &caps[2], &caps[3]);
        return numeric_renderings(day, month, year);
    }
    if let Some(caps) = MONTH_YEAR.captures(text) {
        let (month, year) = (&caps[1], &caps[2]);
        return vec![
            format!("{:0>2}/{year}", month),
            format!("{:0>2}-{year}", month),
        ];
    }
    Vec::new()
}

fn numeric_renderings(day: &str, month: &str, year: &str) -> Vec<String> {
    vec![
        format!("{:0>2}/{:0>2}/{year}", day, month),
        format!("{:0>2}-{:0>2}-{year}", day, month),
        format!("{year}-{:0>2}-{:0>2}", month, day),
    ]
}

fn parse_stored_date(value: &str) -> Option<NaiveDate> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.date_naive());
    }
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
