//! Session identifiers and liveness trackers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for a recorded session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidSessionId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of proxied session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Interactive SSH shell.
    Ssh,
    /// Kubernetes exec/attach session.
    Kubernetes,
    /// Database client session.
    Database,
    /// Web application session.
    App,
    /// Remote desktop session.
    Desktop,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Kubernetes => "kubernetes",
            Self::Database => "database",
            Self::App => "app",
            Self::Desktop => "desktop",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "ssh" => Ok(Self::Ssh),
            "kubernetes" => Ok(Self::Kubernetes),
            "database" => Ok(Self::Database),
            "app" => Ok(Self::App),
            "desktop" => Ok(Self::Desktop),
            other => Err(crate::Error::UnknownSessionKind(other.to_string())),
        }
    }
}

/// Time-bounded liveness record for a running session.
///
/// Trackers are owned by the node proxying the session, which keeps pushing
/// `expires_at` forward while the session is alive. Readers only ever see
/// snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTracker {
    pub session_id: SessionId,
    pub kind: SessionKind,
    /// Host proxying the session, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl SessionTracker {
    /// Create a tracker registered at `created_at` and live until `expires_at`.
    pub fn new(
        session_id: SessionId,
        kind: SessionKind,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            session_id,
            kind,
            hostname: None,
            created_at,
            expires_at,
        }
    }

    /// A tracker is active at `now` iff its expiry is strictly after `now`.
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}
