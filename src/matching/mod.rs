//! Name matching: normalization, similarity scoring, title extraction,
//! fuzzy search and duplicate grouping.

pub mod dedupe;
pub mod extract;
pub mod fuzzy;
pub mod normalize;
pub mod similarity;

pub use dedupe::{choose_keeper, find_duplicate_groups};
pub use extract::extract_speaker_name;
pub use fuzzy::{fuzzy_search, DEFAULT_THRESHOLD};
pub use normalize::{normalize_name, slugify, strip_accents_lower};
pub use similarity::similarity;
