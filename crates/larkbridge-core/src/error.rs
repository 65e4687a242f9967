//! Error types for larkbridge-core.

use thiserror::Error;

/// Result type alias for larkbridge-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while decoding upstream payloads or validating input.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The upstream envelope carried a non-zero `err_code`.
    #[error("upstream error {code}: {message}")]
    Upstream { code: i64, message: String },

    /// A payload did not have any of the accepted shapes.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Caller-supplied input was rejected before any request was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
