//! Value coercion and the value-function registry
//!
//! Pure functions over `serde_json::Value`. Coercion failures surface as
//! [`HarvestError::CoercionFailure`](crate::errors::HarvestError) so callers
//! can decide whether to raise or degrade.

pub mod cast;
pub mod helpers;
pub mod registry;

pub use cast::{cast, is_number, is_truthy, parse_timestamp, render, to_bool, CastKind};
pub use helpers::{canonical_json, delimiter_list_to_string, key_value_list_to_dict, slice_value};
pub use registry::{FunctionRegistry, ValueFunction};
