//! Error types for MzGIS

use thiserror::Error;

/// Main error type for MzGIS pipeline operations.
///
/// A failure from a delegated operation is fatal to the pipeline that issued
/// it; no stage is retried and intermediate outputs already written are left
/// in place. A feature matching no classification rule is not an error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid parameter: {name} ({reason})")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Operation '{operation}' did not produce output '{key}'")]
    MissingOutput { operation: String, key: &'static str },

    #[error("Operation '{operation}' failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Invalid zone rule: {0}")]
    InvalidRule(String),
}

/// Result type alias for MzGIS operations
pub type Result<T> = std::result::Result<T, Error>;
