use std::time::Duration;
use thiserror::Error;

/// Result type alias for biosight-core
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the biosight insights assistant
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error for file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// A generation request did not produce a reply
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Parse/serialization errors
    #[error("parse error: {0}")]
    Parse(String),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Generation(GenerationError::Cancelled))
    }
}

/// Ways a single request to the answer endpoint can settle without a reply
///
/// `Cancelled` is kept apart from the other variants: a cancelled request
/// produces no transcript entry, while every other variant is turned into
/// the fixed apology message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Network-level failure (connect, TLS, reset, ...)
    #[error("transport failure: {0}")]
    Transport(String),

    /// Endpoint answered with a non-2xx status
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Endpoint answered 2xx but the body was not JSON
    #[error("malformed response body: {0}")]
    MalformedBody(String),

    /// Client-side timeout elapsed
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The request was aborted by the caller
    #[error("request cancelled")]
    Cancelled,
}

impl GenerationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status { status, body: body.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBody(message.into())
    }

    /// Short label used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::MalformedBody(_) => "malformed_body",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}
