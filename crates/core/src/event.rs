//! Audit events recorded for sessions.
//!
//! The set of events is closed: every consumer matches exhaustively, so adding
//! a variant forces each decision site (notably the session-end composer) to
//! say what it means for that variant.

use crate::session::SessionId;
use crate::upload::UploadId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Event type code for [`AuditEvent::SessionStart`].
pub const SESSION_START_EVENT: &str = "session.start";
/// Event type code for [`AuditEvent::SessionJoin`].
pub const SESSION_JOIN_EVENT: &str = "session.join";
/// Event type code for [`AuditEvent::SessionEnd`].
pub const SESSION_END_EVENT: &str = "session.end";
/// Event type code for [`AuditEvent::DesktopSessionStart`].
pub const DESKTOP_SESSION_START_EVENT: &str = "windows.desktop.session.start";
/// Event type code for [`AuditEvent::DesktopSessionEnd`].
pub const DESKTOP_SESSION_END_EVENT: &str = "windows.desktop.session.end";
/// Event type code for [`AuditEvent::SessionUpload`].
pub const SESSION_UPLOAD_EVENT: &str = "session.upload";

/// Fields shared by every audit event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Session the event belongs to.
    pub session_id: SessionId,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

impl EventMetadata {
    pub fn new(session_id: SessionId, time: OffsetDateTime) -> Self {
        Self { session_id, time }
    }
}

/// An interactive (shell or kubernetes) session started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStart {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub user: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub server_hostname: String,
}

/// A user joined an interactive session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionJoin {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub user: String,
}

/// An interactive session ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnd {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub user: String,
    #[serde(default)]
    pub server_hostname: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub session_start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub session_stop: OffsetDateTime,
}

/// A remote desktop session started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopSessionStart {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub user: String,
    #[serde(default)]
    pub desktop_addr: String,
    #[serde(default)]
    pub desktop_name: String,
}

/// A remote desktop session ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopSessionEnd {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub user: String,
    #[serde(default)]
    pub desktop_addr: String,
    #[serde(default)]
    pub desktop_name: String,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_time: OffsetDateTime,
    /// Whether the session produced a recording.
    #[serde(default)]
    pub recorded: bool,
}

/// A session recording upload was finalized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpload {
    #[serde(flatten)]
    pub metadata: EventMetadata,
    pub upload_id: UploadId,
    pub part_count: usize,
    pub size_bytes: u64,
    /// Backend locator of the finalized recording.
    pub recording_uri: String,
}

/// Audit event recorded for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum AuditEvent {
    #[serde(rename = "session.start")]
    SessionStart(SessionStart),
    #[serde(rename = "session.join")]
    SessionJoin(SessionJoin),
    #[serde(rename = "session.end")]
    SessionEnd(SessionEnd),
    #[serde(rename = "windows.desktop.session.start")]
    DesktopSessionStart(DesktopSessionStart),
    #[serde(rename = "windows.desktop.session.end")]
    DesktopSessionEnd(DesktopSessionEnd),
    #[serde(rename = "session.upload")]
    SessionUpload(SessionUpload),
}

impl AuditEvent {
    /// Event type code as written to the log.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStart(_) => SESSION_START_EVENT,
            Self::SessionJoin(_) => SESSION_JOIN_EVENT,
            Self::SessionEnd(_) => SESSION_END_EVENT,
            Self::DesktopSessionStart(_) => DESKTOP_SESSION_START_EVENT,
            Self::DesktopSessionEnd(_) => DESKTOP_SESSION_END_EVENT,
            Self::SessionUpload(_) => SESSION_UPLOAD_EVENT,
        }
    }

    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::SessionStart(e) => &e.metadata,
            Self::SessionJoin(e) => &e.metadata,
            Self::SessionEnd(e) => &e.metadata,
            Self::DesktopSessionStart(e) => &e.metadata,
            Self::DesktopSessionEnd(e) => &e.metadata,
            Self::SessionUpload(e) => &e.metadata,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.metadata().session_id
    }

    pub fn time(&self) -> OffsetDateTime {
        self.metadata().time
    }
}
