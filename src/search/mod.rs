//! Free-text search planning: predicate trees and date-query handling.

pub mod dates;
pub mod predicate;

pub use dates::{date_renderings, query_variants};
pub use predicate::{build_predicate, Field, Predicate, VideoFields};
