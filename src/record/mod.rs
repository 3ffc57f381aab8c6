//! Records and their transformations
//!
//! A [`Record`] is an insertion-ordered mapping from string keys to JSON
//! values, plus the list of match expressions that passed or failed
//! against it.

mod flatten;
mod freshness;
mod model;

pub use flatten::{flatten_map, unflatten_map};
pub use freshness::Freshness;
pub use model::{JsonMergeMode, Record};
