//! Error types for the harvest engine
//!
//! Error codes:
//! - HARVEST_INVALID_EXPRESSION
//! - HARVEST_KEY_NOT_FOUND
//! - HARVEST_INDEX_NOT_FOUND
//! - HARVEST_DUPLICATE_INDEX
//! - HARVEST_COERCION_FAILURE
//! - HARVEST_NOT_COMPARABLE
//! - HARVEST_UNSUPPORTED_OPERATION
//! - HARVEST_NOT_SUPPORTED
//! - HARVEST_RECORDSET_NOT_FOUND
//! - HARVEST_INVALID_ARGUMENT
//! - HARVEST_INVALID_JSON
//! - HARVEST_CONFIG_FAILED

use std::fmt;

use thiserror::Error;

/// Result type for engine operations
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Stable error codes, one per [`HarvestError`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestErrorCode {
    InvalidExpression,
    KeyNotFound,
    IndexNotFound,
    DuplicateIndex,
    CoercionFailure,
    NotComparable,
    UnsupportedOperation,
    NotSupported,
    RecordSetNotFound,
    InvalidArgument,
    InvalidJson,
    ConfigFailed,
}

impl HarvestErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            HarvestErrorCode::InvalidExpression => "HARVEST_INVALID_EXPRESSION",
            HarvestErrorCode::KeyNotFound => "HARVEST_KEY_NOT_FOUND",
            HarvestErrorCode::IndexNotFound => "HARVEST_INDEX_NOT_FOUND",
            HarvestErrorCode::DuplicateIndex => "HARVEST_DUPLICATE_INDEX",
            HarvestErrorCode::CoercionFailure => "HARVEST_COERCION_FAILURE",
            HarvestErrorCode::NotComparable => "HARVEST_NOT_COMPARABLE",
            HarvestErrorCode::UnsupportedOperation => "HARVEST_UNSUPPORTED_OPERATION",
            HarvestErrorCode::NotSupported => "HARVEST_NOT_SUPPORTED",
            HarvestErrorCode::RecordSetNotFound => "HARVEST_RECORDSET_NOT_FOUND",
            HarvestErrorCode::InvalidArgument => "HARVEST_INVALID_ARGUMENT",
            HarvestErrorCode::InvalidJson => "HARVEST_INVALID_JSON",
            HarvestErrorCode::ConfigFailed => "HARVEST_CONFIG_FAILED",
        }
    }
}

impl fmt::Display for HarvestErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Engine errors
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    DuplicateIndex(String),

    #[error("Cannot coerce {value} to {target}")]
    CoercionFailure { value: String, target: String },

    #[error("Cannot order {left} against {right}")]
    NotComparable { left: String, right: String },

    #[error("Operation not found on either record or record set: {0}")]
    UnsupportedOperation(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Record set not found: {0}")]
    RecordSetNotFound(String),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to load configuration {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl HarvestError {
    /// Create an invalid expression error
    pub fn invalid_expression(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Create a coercion failure for a value rendered with `Display`
    pub fn coercion(value: impl fmt::Display, target: impl Into<String>) -> Self {
        Self::CoercionFailure {
            value: value.to_string(),
            target: target.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> HarvestErrorCode {
        match self {
            HarvestError::InvalidExpression { .. } => HarvestErrorCode::InvalidExpression,
            HarvestError::KeyNotFound(_) => HarvestErrorCode::KeyNotFound,
            HarvestError::IndexNotFound(_) => HarvestErrorCode::IndexNotFound,
            HarvestError::DuplicateIndex(_) => HarvestErrorCode::DuplicateIndex,
            HarvestError::CoercionFailure { .. } => HarvestErrorCode::CoercionFailure,
            HarvestError::NotComparable { .. } => HarvestErrorCode::NotComparable,
            HarvestError::UnsupportedOperation(_) => HarvestErrorCode::UnsupportedOperation,
            HarvestError::NotSupported(_) => HarvestErrorCode::NotSupported,
            HarvestError::RecordSetNotFound(_) => HarvestErrorCode::RecordSetNotFound,
            HarvestError::InvalidArgument { .. } => HarvestErrorCode::InvalidArgument,
            HarvestError::InvalidJson(_) => HarvestErrorCode::InvalidJson,
            HarvestError::Config { .. } => HarvestErrorCode::ConfigFailed,
        }
    }

    /// Whether set-level match evaluation may degrade this error to "no match"
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HarvestError::CoercionFailure { .. } | HarvestError::NotComparable { .. }
        )
    }
}
