//! Catalog services - the entry points an HTTP layer calls.

pub mod assign;
pub mod live;
pub mod search;
pub mod speakers;

pub use assign::{auto_assign_speakers, AssignReport};
pub use live::LiveService;
pub use search::{global_search, GlobalSearchResults, Pagination};
pub use speakers::{
    clean_duplicates, find_or_create_speaker, merge_speakers, rename_speaker,
    resolve_speaker_by_name, DedupeReport,
};
