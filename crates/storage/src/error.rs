//! Storage error types.

use sealer_core::UploadId;
use thiserror::Error;

/// Upload store operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload not found: {0}")]
    NotFound(UploadId),

    #[error("upload already completed: {0}")]
    UploadCompleted(UploadId),

    #[error("recording not found for upload {0}")]
    RecordingNotFound(UploadId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt upload record {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
