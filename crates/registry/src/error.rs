//! Registry error types.

use sealer_core::SessionId;
use thiserror::Error;

/// Tracker source and audit log operation errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session tracker not found: {0}")]
    NotFound(SessionId),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

impl RegistryError {
    /// Whether the error only means the session cannot be proven alive.
    ///
    /// Callers reconciling uploads treat these as "presumed inactive" rather
    /// than as failures.
    pub fn presumes_inactive(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AccessDenied(_))
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
