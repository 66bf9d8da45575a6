//! Multipart upload storage for session recordings.
//!
//! This crate provides:
//! - The [`UploadStore`] trait consumed by the upload completer
//! - Part storage with atomic writes and idempotent completion
//! - Backends: process-local memory and local filesystem

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{filesystem::FilesystemUploadStore, memory::MemoryUploadStore};
pub use error::{StorageError, StorageResult};
pub use traits::UploadStore;

use sealer_core::config::StorageConfig;
use std::sync::Arc;

/// Create an upload store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn UploadStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryUploadStore::new())),
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemUploadStore::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
