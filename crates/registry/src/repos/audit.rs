//! Audit event log.

use crate::error::RegistryResult;
use async_trait::async_trait;
use sealer_core::{AuditEvent, SessionId};

/// Per-session audit event streams plus the global emission sink.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Events recorded for a session, in append order.
    ///
    /// A session with no events yields an empty sequence.
    async fn get_session_events(&self, session_id: SessionId) -> RegistryResult<Vec<AuditEvent>>;

    /// Append an event to the global log.
    ///
    /// The event becomes visible in its session's sequence as well.
    async fn emit(&self, event: &AuditEvent) -> RegistryResult<()>;
}
