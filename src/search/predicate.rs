//! Typed search predicate tree.
//!
//! The planner turns a free-text query into an AND/OR tree of
//! field-comparison leaves. The tree can be evaluated directly against a
//! video's fields (the reference semantics, used by tests) and is
//! translated by the store adapter into parameterized SQL - user input
//! never reaches the query text itself.

use crate::matching::normalize::strip_accents_lower;
use crate::search::dates::{date_renderings, query_variants};

/// A searchable facet of a video row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    SpeakerName,
    TopicName,
    Tags,
    /// The publish date, matched through all of its human-readable renderings.
    PublishedRenderings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case- and accent-insensitive substring match. The needle is stored
    /// already folded.
    Contains { field: Field, needle: String },
    SpeakerIs(i64),
    TopicIs(i64),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Combine with another predicate under AND, flattening as it goes.
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Evaluate against one video's fields.
    pub fn matches(&self, video: &VideoFields<'_>) -> bool {
        match self {
            Predicate::Contains { field, needle } => video.haystack(*field).contains(needle.as_str()),
            Predicate::SpeakerIs(id) => video.speaker_id == Some(*id),
            Predicate::TopicIs(id) => video.topic_id == Some(*id),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(video)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(video)),
        }
    }
}

/// The raw field values of one video row, as the evaluator sees them.
#[derive(Debug, Default)]
pub struct VideoFields<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub speaker_name: &'a str,
    pub topic_name: &'a str,
    pub tags: &'a str,
    pub published_at: &'a str,
    pub speaker_id: Option<i64>,
    pub topic_id: Option<i64>,
}

impl VideoFields<'_> {
    fn haystack(&self, field: Field) -> String {
        match field {
            Field::Title => strip_accents_lower(self.title),
            Field::Description => strip_accents_lower(self.description),
            Field::SpeakerName => strip_accents_lower(self.speaker_name),
            Field::TopicName => strip_accents_lower(self.topic_name),
            Field::Tags => strip_accents_lower(self.tags),
            Field::PublishedRenderings => date_renderings(self.published_at),
        }
    }
}

/// Fields a free-text needle is checked against directly.
const TEXT_FIELDS: [Field; 5] = [
    Field::Title,
    Field::Description,
    Field::SpeakerName,
    Field::TopicName,
    Field::Tags,
];

/// Build the multi-field predicate for a free-text catalog query.
///
/// Blank queries yield `None` - the caller decides whether that means
/// "everything" (video listing) or "nothing" (global search). A match on
/// any field is a hit; structural filters are ANDed on by the caller.
pub fn build_predicate(query: &str) -> Option<Predicate> {
    let needle = strip_accents_lower(query);
    if needle.is_empty() {
        return None;
    }

    let mut leaves: Vec<Predicate> = TEXT_FIELDS
        .iter()
        .map(|field| Predicate::Contains { field: *field, needle: needle.clone() })
        .collect();

    for variant in query_variants(query) {
        leaves.push(Predicate::Contains {
            field: Field::PublishedRenderings,
            needle: variant,
        });
    }

    Some(Predicate::Or(leaves))
}
