//! Named operation dispatch for an orchestration layer
//!
//! An operation name plus a JSON argument object resolves to either a
//! set-level or a record-level handler:
//!
//! ```ignore
//! use harvest::operations::{Args, OperationContext, OperationRegistry};
//!
//! let registry = OperationRegistry::default();
//! let args = Args::new().with("source_key", "tags");
//! registry.apply(&mut set, "unwind", &args, &OperationContext::default())?;
//! ```

mod args;
mod registry;

pub use args::Args;
pub use registry::{
    Granularity, OperationContext, OperationRegistry, Outcome, RecordOperation, SetOperation,
};
