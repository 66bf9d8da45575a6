//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid upload ID: {0}")]
    InvalidUploadId(String),

    #[error("invalid session ID: {0}")]
    InvalidSessionId(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("unknown session kind: {0}")]
    UnknownSessionKind(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
