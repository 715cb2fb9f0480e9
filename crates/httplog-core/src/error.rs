//! Error types for httplog.

use thiserror::Error;

/// Result type alias using [`HttplogError`].
pub type HttplogResult<T> = Result<T, HttplogError>;

/// Errors raised by httplog.
#[derive(Debug, Error)]
pub enum HttplogError {
    /// No log context was bound into the request context.
    ///
    /// This means the access log middleware is not installed in front of the
    /// code asking for an event. It is an integration error, not a runtime
    /// condition to recover from.
    #[error("no log context bound to this request; is the access log middleware installed?")]
    MissingContext,

    /// A record could not be serialized.
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A record serialized to something other than a JSON object.
    #[error("log record must serialize to a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error while writing a record.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttplogError {
    /// Shorthand for [`HttplogError::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
