//! Error types for the open-API layer.

use larkbridge_core::{CoreError, Namespace};
use thiserror::Error;

/// Result type alias for larkbridge-api operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur while resolving metadata or talking to the upstream.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A name, alias or label could not be found in any populated table.
    #[error("{namespace} '{name}' not found in {within}")]
    Resolution {
        namespace: Namespace,
        name: String,
        within: String,
    },

    /// A direct id query returned no items.
    #[error("work item not found: {0}")]
    NotFound(i64),

    /// The upstream answered with a non-zero `err_code`.
    #[error("upstream error {code}: {message}")]
    Upstream { code: i64, message: String },

    /// Input rejected before any request was made.
    #[error("validation error: {0}")]
    Validation(String),

    /// The transport could not produce a JSON body.
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload did not have any accepted shape.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Build a resolution error.
    pub fn unresolved(
        namespace: Namespace,
        name: impl Into<String>,
        within: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            namespace,
            name: name.into(),
            within: within.into(),
        }
    }

    /// Whether this error means a name could not be resolved.
    #[must_use]
    pub const fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Upstream { code, message } => Self::Upstream { code, message },
            CoreError::UnexpectedShape(msg) => Self::UnexpectedShape(msg),
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::Json(e) => Self::Json(e),
        }
    }
}
