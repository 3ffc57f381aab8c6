//! Match expression engine
//!
//! Compact textual predicates such as `age>=18` or `name=doe`:
//!
//! - [`Operator`]: operator detection by fixed priority
//! - [`Expression`]: key/operator/value split, function-call operands
//! - [`Match`]: per-record evaluation with a rendered trace
//! - [`BackendFilter`]: translation into a backend filter expression
//!
//! Parsing happens once per expression; evaluation happens per record.

mod evaluator;
mod expression;
mod filter;
mod operator;

pub use evaluator::Match;
pub use expression::{Expression, Operand};
pub use filter::BackendFilter;
pub use operator::Operator;
