//! harvest - match expressions and record transformation
//!
//! Records are ordered JSON mappings carrying match state; record sets add
//! indexing, deduplication, unwinding and bulk dispatch of named
//! operations.

pub mod config;
pub mod errors;
pub mod functions;
pub mod matching;
pub mod observability;
pub mod operations;
pub mod record;
pub mod recordset;

pub use config::EngineConfig;
pub use errors::{HarvestError, HarvestErrorCode, HarvestResult};
pub use functions::FunctionRegistry;
pub use matching::{BackendFilter, Expression, Match, Operator};
pub use operations::{Args, OperationContext, OperationRegistry, Outcome};
pub use record::Record;
pub use recordset::{JoinType, RecordSet, RecordSetCollection};
