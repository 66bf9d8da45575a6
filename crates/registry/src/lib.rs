//! Session tracker sources and audit event logs for sealer.
//!
//! This crate provides the read side the upload completer reconciles against:
//! - [`SessionTrackerSource`]: which sessions are provably alive
//! - [`AuditLog`]: per-session event streams and the emission sink
//! - In-memory and filesystem implementations of both
//! - [`LegacyTrackerSource`] for registries with restricted tracker kinds

pub mod error;
pub mod filesystem;
pub mod legacy;
pub mod memory;
pub mod repos;

pub use error::{RegistryError, RegistryResult};
pub use filesystem::{FilesystemAuditLog, FilesystemTrackerRegistry};
pub use legacy::LegacyTrackerSource;
pub use memory::{MemoryAuditLog, MemoryTrackerRegistry};
pub use repos::{AuditLog, SessionTrackerSource};

use sealer_core::config::{AuditConfig, TrackerConfig};
use std::sync::Arc;

/// Create a session tracker source from configuration.
pub async fn tracker_source_from_config(
    config: &TrackerConfig,
) -> RegistryResult<Arc<dyn SessionTrackerSource>> {
    config.validate().map_err(RegistryError::Config)?;

    match config {
        TrackerConfig::Memory => Ok(Arc::new(MemoryTrackerRegistry::new())),
        TrackerConfig::Filesystem { path } => {
            let registry = FilesystemTrackerRegistry::new(path).await?;
            Ok(Arc::new(registry))
        }
        TrackerConfig::Legacy {
            path,
            restricted_kinds,
        } => {
            tracing::info!(
                restricted_kinds = ?restricted_kinds,
                "Using legacy tracker source; restricted sessions rely on the grace period"
            );
            let registry = FilesystemTrackerRegistry::new(path).await?;
            Ok(Arc::new(LegacyTrackerSource::new(
                Arc::new(registry),
                restricted_kinds.clone(),
            )))
        }
    }
}

/// Create an audit log from configuration.
pub async fn audit_log_from_config(config: &AuditConfig) -> RegistryResult<Arc<dyn AuditLog>> {
    config.validate().map_err(RegistryError::Config)?;

    match config {
        AuditConfig::Memory => Ok(Arc::new(MemoryAuditLog::new())),
        AuditConfig::Filesystem { path } => {
            let log = FilesystemAuditLog::new(path).await?;
            Ok(Arc::new(log))
        }
    }
}
