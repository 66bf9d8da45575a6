use sealer_core::event::{DesktopSessionStart, EventMetadata, SessionJoin, SessionStart};
use sealer_core::{AuditEvent, SessionId, SessionKind, SessionTracker};
use time::{Duration, OffsetDateTime};

pub fn session_start(session_id: SessionId, user: &str, at: OffsetDateTime) -> AuditEvent {
    AuditEvent::SessionStart(SessionStart {
        metadata: EventMetadata::new(session_id, at),
        user: user.to_string(),
        login: "root".to_string(),
        server_hostname: "node-1".to_string(),
    })
}

pub fn session_join(session_id: SessionId, user: &str, at: OffsetDateTime) -> AuditEvent {
    AuditEvent::SessionJoin(SessionJoin {
        metadata: EventMetadata::new(session_id, at),
        user: user.to_string(),
    })
}

pub fn desktop_start(session_id: SessionId, user: &str, at: OffsetDateTime) -> AuditEvent {
    AuditEvent::DesktopSessionStart(DesktopSessionStart {
        metadata: EventMetadata::new(session_id, at),
        user: user.to_string(),
        desktop_addr: "10.0.0.5:3389".to_string(),
        desktop_name: "win-build-01".to_string(),
    })
}

/// A tracker created at `now` that stays live for `ttl`.
pub fn tracker(kind: SessionKind, now: OffsetDateTime, ttl: Duration) -> SessionTracker {
    SessionTracker::new(SessionId::new(), kind, now, now + ttl)
}
