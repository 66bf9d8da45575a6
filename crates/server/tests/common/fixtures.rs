use bytes::Bytes;
use sealer_core::event::{DesktopSessionStart, EventMetadata, SessionEnd, SessionStart};
use sealer_core::{AuditEvent, Clock, ManualClock, SessionId, SessionKind, SessionTracker, Upload};
use sealer_registry::{AuditLog, MemoryAuditLog, MemoryTrackerRegistry};
use sealer_server::{Completer, CompleterBuilder};
use sealer_storage::{MemoryUploadStore, UploadStore};
use std::sync::Arc;
use std::time::Duration;

/// In-memory collaborators sharing one manual clock.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryUploadStore>,
    pub trackers: Arc<MemoryTrackerRegistry>,
    pub audit: Arc<MemoryAuditLog>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        Self {
            store: Arc::new(MemoryUploadStore::with_clock(clock.clone())),
            trackers: Arc::new(MemoryTrackerRegistry::with_clock(clock.clone())),
            audit: Arc::new(MemoryAuditLog::new()),
            clock,
        }
    }

    /// Builder wired to the harness, with a loop interval long enough that
    /// tests drive ticks through `check_uploads` themselves.
    pub fn builder(&self) -> CompleterBuilder {
        Completer::builder()
            .upload_store(self.store.clone())
            .tracker_source(self.trackers.clone())
            .audit_log(self.audit.clone())
            .clock(self.clock.clone())
            .check_interval(Duration::from_secs(24 * 3600))
            .emission_delay(Duration::ZERO)
    }

    /// Start an upload for `session_id` with one part.
    pub async fn upload(&self, session_id: SessionId) -> Upload {
        let upload = self.store.create_upload(session_id).await.unwrap();
        self.store
            .upload_part(&upload, 1, Bytes::from_static(b"recording-bytes"))
            .await
            .unwrap();
        self.store.get_upload(upload.id).await.unwrap()
    }

    /// Register a tracker for `session_id` that stays live for `ttl`.
    pub async fn track(&self, session_id: SessionId, kind: SessionKind, ttl: time::Duration) {
        let now = self.clock.now();
        self.trackers
            .upsert_tracker(SessionTracker::new(session_id, kind, now, now + ttl))
            .await;
    }

    pub async fn is_completed(&self, upload: &Upload) -> bool {
        self.store.get_upload(upload.id).await.unwrap().completed
    }

    pub async fn record(&self, event: AuditEvent) {
        self.audit.emit(&event).await.unwrap();
    }
}

pub fn session_start(session_id: SessionId, at: time::OffsetDateTime) -> AuditEvent {
    AuditEvent::SessionStart(SessionStart {
        metadata: EventMetadata::new(session_id, at),
        user: "alice".to_string(),
        login: "root".to_string(),
        server_hostname: "node-1".to_string(),
    })
}

pub fn desktop_start(session_id: SessionId, at: time::OffsetDateTime) -> AuditEvent {
    AuditEvent::DesktopSessionStart(DesktopSessionStart {
        metadata: EventMetadata::new(session_id, at),
        user: "bob".to_string(),
        desktop_addr: "10.0.0.5:3389".to_string(),
        desktop_name: "win-build-01".to_string(),
    })
}

pub fn session_end(session_id: SessionId, at: time::OffsetDateTime) -> AuditEvent {
    AuditEvent::SessionEnd(SessionEnd {
        metadata: EventMetadata::new(session_id, at),
        user: "alice".to_string(),
        server_hostname: "node-1".to_string(),
        participants: vec!["alice".to_string()],
        session_start: at,
        session_stop: at,
    })
}
