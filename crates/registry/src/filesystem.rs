//! Filesystem-backed tracker registry and audit log.
//!
//! Trackers live as one JSON document per session in a shared directory,
//! written by the proxying nodes with temp file + rename. The audit log is a
//! set of JSON Lines files: a global `audit.jsonl` and one
//! `sessions/<session_id>.jsonl` per session.

use crate::error::{RegistryError, RegistryResult};
use crate::repos::{AuditLog, SessionTrackerSource};
use async_trait::async_trait;
use sealer_core::{AuditEvent, Clock, SessionId, SessionTracker, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

const TRACKER_EXTENSION: &str = "json";
const GLOBAL_LOG: &str = "audit.jsonl";
const SESSIONS_DIR: &str = "sessions";

/// Session tracker registry stored as one JSON file per session.
#[derive(Debug)]
pub struct FilesystemTrackerRegistry {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FilesystemTrackerRegistry {
    pub async fn new(root: impl AsRef<Path>) -> RegistryResult<Self> {
        Self::with_clock(root, Arc::new(SystemClock)).await
    }

    /// Create a registry judging expiry against `clock`.
    pub async fn with_clock(root: impl AsRef<Path>, clock: Arc<dyn Clock>) -> RegistryResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, clock })
    }

    fn tracker_path(&self, session_id: SessionId) -> PathBuf {
        self.root
            .join(format!("{session_id}.{TRACKER_EXTENSION}"))
    }

    /// Insert or replace the tracker of a session.
    #[instrument(skip(self, tracker), fields(session_id = %tracker.session_id))]
    pub async fn upsert_tracker(&self, tracker: &SessionTracker) -> RegistryResult<()> {
        let data = serde_json::to_vec_pretty(tracker)?;
        write_atomic(&self.tracker_path(tracker.session_id), &data).await
    }

    /// Remove a session's tracker. Removing an absent tracker succeeds.
    pub async fn remove_tracker(&self, session_id: SessionId) -> RegistryResult<()> {
        match fs::remove_file(self.tracker_path(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a tracker file; `Ok(None)` if it vanished.
    async fn read_tracker(&self, path: &Path) -> RegistryResult<Option<SessionTracker>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| RegistryError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl SessionTrackerSource for FilesystemTrackerRegistry {
    #[instrument(skip(self))]
    async fn get_active_session_trackers(&self) -> RegistryResult<Vec<SessionTracker>> {
        let now = self.clock.now();
        let mut trackers = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // Skips in-flight temp files as well.
            if path.extension().and_then(|e| e.to_str()) != Some(TRACKER_EXTENSION) {
                continue;
            }
            // An unreadable tracker fails the whole listing: dropping it would
            // report a possibly live session as inactive.
            if let Some(tracker) = self.read_tracker(&path).await?
                && tracker.is_active_at(now)
            {
                trackers.push(tracker);
            }
        }

        Ok(trackers)
    }

    async fn get_session_tracker(&self, session_id: SessionId) -> RegistryResult<SessionTracker> {
        let now = self.clock.now();
        match self.read_tracker(&self.tracker_path(session_id)).await? {
            Some(tracker) if tracker.is_active_at(now) => Ok(tracker),
            _ => Err(RegistryError::NotFound(session_id)),
        }
    }
}

/// Audit log stored as JSON Lines files.
#[derive(Debug)]
pub struct FilesystemAuditLog {
    root: PathBuf,
    /// Keeps the global and per-session appends of one event together.
    append_lock: Mutex<()>,
}

impl FilesystemAuditLog {
    pub async fn new(root: impl AsRef<Path>) -> RegistryResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(SESSIONS_DIR)).await?;
        Ok(Self {
            root,
            append_lock: Mutex::new(()),
        })
    }

    fn session_path(&self, session_id: SessionId) -> PathBuf {
        self.root
            .join(SESSIONS_DIR)
            .join(format!("{session_id}.jsonl"))
    }

    /// Every event emitted so far, in emission order.
    pub async fn events(&self) -> RegistryResult<Vec<AuditEvent>> {
        read_events(&self.root.join(GLOBAL_LOG)).await
    }
}

#[async_trait]
impl AuditLog for FilesystemAuditLog {
    async fn get_session_events(&self, session_id: SessionId) -> RegistryResult<Vec<AuditEvent>> {
        read_events(&self.session_path(session_id)).await
    }

    #[instrument(skip(self, event), fields(session_id = %event.session_id(), event = event.event_type()))]
    async fn emit(&self, event: &AuditEvent) -> RegistryResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self.append_lock.lock().await;
        append_line(&self.root.join(GLOBAL_LOG), &line).await?;
        append_line(&self.session_path(event.session_id()), &line).await?;
        Ok(())
    }
}

async fn append_line(path: &Path, line: &[u8]) -> RegistryResult<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line).await?;
    file.sync_data().await?;
    Ok(())
}

/// Parse a JSON Lines file. A missing file is an empty log.
///
/// A final line without its newline is a torn append and is skipped.
async fn read_events(path: &Path) -> RegistryResult<Vec<AuditEvent>> {
    let data = match fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let complete = match data.rfind('\n') {
        Some(end) => &data[..=end],
        None => "",
    };
    if complete.len() < data.len() {
        tracing::warn!(path = %path.display(), "Ignoring torn trailing audit record");
    }

    complete
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| RegistryError::Corrupt {
                path: path.display().to_string(),
                reason: format!("record {}: {}", index + 1, e),
            })
        })
        .collect()
}

/// Write to temp file with unique name, fsync, then rename for atomicity.
async fn write_atomic(path: &Path, data: &[u8]) -> RegistryResult<()> {
    let temp_name = format!(".tmp.{}", Uuid::new_v4());
    let temp_path = path.with_file_name(
        path.file_name()
            .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
            .unwrap_or_else(|| temp_name.clone()),
    );
    {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
    }
    fs::rename(&temp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_read_events_missing_file_is_empty() {
        let temp = tempdir().unwrap();
        let events = read_events(&temp.path().join("none.jsonl")).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_read_events_rejects_corrupt_record() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bad.jsonl");
        fs::write(&path, b"{\"event\":\"nope\"}\n").await.unwrap();

        match read_events(&path).await {
            Err(RegistryError::Corrupt { reason, .. }) => assert!(reason.starts_with("record 1")),
            other => panic!("expected corrupt error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_temp_tracker_files_are_ignored() {
        let temp = tempdir().unwrap();
        let registry = FilesystemTrackerRegistry::new(temp.path()).await.unwrap();
        fs::write(temp.path().join("x.json.tmp.123"), b"partial")
            .await
            .unwrap();

        assert!(
            registry
                .get_active_session_trackers()
                .await
                .unwrap()
                .is_empty()
        );
    }
}
