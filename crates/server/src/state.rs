//! Application state shared across handlers.

use crate::emission::EmissionRegistry;
use sealer_core::config::AppConfig;
use sealer_storage::UploadStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Upload store the completer reconciles.
    pub storage: Arc<dyn UploadStore>,
    /// Emission tasks of the running completer.
    pub emissions: Arc<EmissionRegistry>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn UploadStore>,
        emissions: Arc<EmissionRegistry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            emissions,
        }
    }
}
