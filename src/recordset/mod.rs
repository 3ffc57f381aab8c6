//! Record sets, index snapshots and named collections
//!
//! - [`RecordSet`]: ordered records with matching, dedup, unwind and indexes
//! - [`Index`] / [`IndexKey`]: unordered composite-key snapshots
//! - [`RecordSetCollection`]: sets by name, with joins on a shared index
//!
//! Indexes are not maintained incrementally. A mutation after
//! `create_index` is invisible to the index until `rebuild_index`.

mod collection;
mod index;
mod set;

pub use collection::{JoinType, RecordSetCollection, RecordSetSummary};
pub use index::{Index, IndexKey};
pub use set::RecordSet;
