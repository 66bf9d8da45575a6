//! Configuration types shared across crates.

use crate::session::SessionKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Upload completer configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompleterConfig {
    /// Seconds an upload whose session cannot be proven alive is left alone
    /// before it is finalized (default: 0, finalize on the first tick).
    #[serde(default)]
    pub grace_period_secs: u64,
    /// Seconds between reconciliation ticks (default: 5 minutes).
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Seconds to wait after completing an upload before emitting its audit
    /// events (default: 2 minutes). Gives a slow streaming node a last chance
    /// to write its own session end event.
    #[serde(default = "default_emission_delay_secs")]
    pub emission_delay_secs: u64,
    /// Seconds to wait for outstanding emissions on shutdown (default: 30).
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_check_interval_secs() -> u64 {
    300
}

fn default_emission_delay_secs() -> u64 {
    120
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for CompleterConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 0,
            check_interval_secs: default_check_interval_secs(),
            emission_delay_secs: default_emission_delay_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl CompleterConfig {
    /// Get the grace period as a Duration.
    pub fn grace_period(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.grace_period_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Get the check interval as a std::time::Duration.
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs)
    }

    /// Get the emission delay as a std::time::Duration.
    pub fn emission_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.emission_delay_secs)
    }

    /// Get the shutdown timeout as a std::time::Duration.
    pub fn shutdown_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validate completer configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.check_interval_secs == 0 {
            return Err("completer.check_interval_secs cannot be 0. \
                 Use a value >= 1 second."
                .to_string());
        }

        if self.grace_period_secs > i64::MAX as u64 {
            return Err(format!(
                "completer.grace_period_secs {} exceeds maximum value {}",
                self.grace_period_secs,
                i64::MAX
            ));
        }

        Ok(())
    }
}

/// Upload store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local store. Uploads are lost on restart.
    Memory,
    /// Local filesystem store.
    Filesystem {
        /// Root directory for uploads and finalized recordings.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/uploads"),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Memory => Ok(()),
            StorageConfig::Filesystem { path } => validate_path("storage.path", path),
        }
    }
}

/// Session tracker source configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrackerConfig {
    /// Process-local registry.
    Memory,
    /// One JSON file per tracker in a shared directory.
    Filesystem {
        path: PathBuf,
    },
    /// Filesystem registry behind an older auth service that answers
    /// permission-denied for trackers of restricted kinds.
    Legacy {
        path: PathBuf,
        /// Kinds the older service refuses to disclose
        /// (default: database, app, desktop).
        #[serde(default = "default_restricted_kinds")]
        restricted_kinds: Vec<SessionKind>,
    },
}

/// Kinds refused by registries that predate per-kind tracker permissions.
pub fn default_restricted_kinds() -> Vec<SessionKind> {
    vec![SessionKind::Database, SessionKind::App, SessionKind::Desktop]
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/trackers"),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            TrackerConfig::Memory => Ok(()),
            TrackerConfig::Filesystem { path } => validate_path("trackers.path", path),
            TrackerConfig::Legacy { path, .. } => validate_path("trackers.path", path),
        }
    }
}

/// Audit log configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuditConfig {
    /// Process-local log.
    Memory,
    /// JSON Lines files, one global and one per session.
    Filesystem { path: PathBuf },
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/audit"),
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            AuditConfig::Memory => Ok(()),
            AuditConfig::Filesystem { path } => validate_path("audit.path", path),
        }
    }
}

fn validate_path(field: &str, path: &std::path::Path) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    Ok(())
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub completer: CompleterConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub trackers: TrackerConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AppConfig {
    /// Create a test configuration backed entirely by process-local stores.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            completer: CompleterConfig {
                emission_delay_secs: 0,
                ..CompleterConfig::default()
            },
            storage: StorageConfig::Memory,
            trackers: TrackerConfig::Memory,
            audit: AuditConfig::Memory,
        }
    }

    /// Advice for setups where hidden sessions are finalized on the first tick.
    ///
    /// A legacy tracker registry hides live sessions of restricted kinds, so
    /// with a zero grace period their recordings are completed while they
    /// are still streaming.
    pub fn grace_warning(&self) -> Option<String> {
        match &self.trackers {
            TrackerConfig::Legacy {
                restricted_kinds, ..
            } if self.completer.grace_period_secs == 0 && !restricted_kinds.is_empty() => {
                Some(format!(
                    "trackers.type = \"legacy\" hides live {} sessions; with \
                     completer.grace_period_secs = 0 their uploads are finalized \
                     while still recording",
                    restricted_kinds
                        .iter()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join("/")
                ))
            }
            _ => None,
        }
    }

    /// Validate every section, reporting the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.completer.validate()?;
        self.storage.validate()?;
        self.trackers.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}
