//! Process-local tracker registry and audit log.

use crate::error::{RegistryError, RegistryResult};
use crate::repos::{AuditLog, SessionTrackerSource};
use async_trait::async_trait;
use sealer_core::{AuditEvent, Clock, SessionId, SessionTracker, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory session tracker registry.
///
/// Expired trackers are kept until removed but never reported.
#[derive(Debug)]
pub struct MemoryTrackerRegistry {
    clock: Arc<dyn Clock>,
    trackers: RwLock<HashMap<SessionId, SessionTracker>>,
}

impl MemoryTrackerRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a registry judging expiry against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            trackers: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace the tracker of a session.
    pub async fn upsert_tracker(&self, tracker: SessionTracker) {
        self.trackers
            .write()
            .await
            .insert(tracker.session_id, tracker);
    }

    /// Remove a session's tracker, returning it if present.
    pub async fn remove_tracker(&self, session_id: SessionId) -> Option<SessionTracker> {
        self.trackers.write().await.remove(&session_id)
    }
}

impl Default for MemoryTrackerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionTrackerSource for MemoryTrackerRegistry {
    async fn get_active_session_trackers(&self) -> RegistryResult<Vec<SessionTracker>> {
        let now = self.clock.now();
        Ok(self
            .trackers
            .read()
            .await
            .values()
            .filter(|t| t.is_active_at(now))
            .cloned()
            .collect())
    }

    async fn get_session_tracker(&self, session_id: SessionId) -> RegistryResult<SessionTracker> {
        let now = self.clock.now();
        self.trackers
            .read()
            .await
            .get(&session_id)
            .filter(|t| t.is_active_at(now))
            .cloned()
            .ok_or(RegistryError::NotFound(session_id))
    }
}

#[derive(Debug, Default)]
struct AuditState {
    global: Vec<AuditEvent>,
    sessions: HashMap<SessionId, Vec<AuditEvent>>,
}

/// In-memory audit log.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    state: RwLock<AuditState>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event emitted so far, in emission order.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.state.read().await.global.clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn get_session_events(&self, session_id: SessionId) -> RegistryResult<Vec<AuditEvent>> {
        Ok(self
            .state
            .read()
            .await
            .sessions
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn emit(&self, event: &AuditEvent) -> RegistryResult<()> {
        let mut state = self.state.write().await;
        state.global.push(event.clone());
        state
            .sessions
            .entry(event.session_id())
            .or_default()
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealer_core::event::{EventMetadata, SessionJoin};
    use sealer_core::{ManualClock, SessionKind};
    use time::Duration;

    fn join(session_id: SessionId, user: &str, clock: &ManualClock) -> AuditEvent {
        AuditEvent::SessionJoin(SessionJoin {
            metadata: EventMetadata::new(session_id, clock.now()),
            user: user.to_string(),
        })
    }

    #[tokio::test]
    async fn test_expired_trackers_are_not_reported() {
        let clock = Arc::new(ManualClock::default());
        let registry = MemoryTrackerRegistry::with_clock(clock.clone());
        let session_id = SessionId::new();
        registry
            .upsert_tracker(SessionTracker::new(
                session_id,
                SessionKind::Ssh,
                clock.now(),
                clock.now() + Duration::minutes(5),
            ))
            .await;

        assert_eq!(registry.get_active_session_trackers().await.unwrap().len(), 1);
        assert!(registry.get_session_tracker(session_id).await.is_ok());

        clock.advance(Duration::minutes(5));
        assert!(registry.get_active_session_trackers().await.unwrap().is_empty());
        assert!(matches!(
            registry.get_session_tracker(session_id).await,
            Err(RegistryError::NotFound(id)) if id == session_id
        ));
    }

    #[tokio::test]
    async fn test_remove_tracker() {
        let clock = Arc::new(ManualClock::default());
        let registry = MemoryTrackerRegistry::with_clock(clock.clone());
        let session_id = SessionId::new();
        registry
            .upsert_tracker(SessionTracker::new(
                session_id,
                SessionKind::Kubernetes,
                clock.now(),
                clock.now() + Duration::hours(1),
            ))
            .await;

        assert!(registry.remove_tracker(session_id).await.is_some());
        assert!(registry.get_session_tracker(session_id).await.is_err());
        assert!(registry.remove_tracker(session_id).await.is_none());
    }

    #[tokio::test]
    async fn test_emit_is_visible_globally_and_per_session() {
        let clock = ManualClock::default();
        let log = MemoryAuditLog::new();
        let a = SessionId::new();
        let b = SessionId::new();

        log.emit(&join(a, "alice", &clock)).await.unwrap();
        log.emit(&join(b, "bob", &clock)).await.unwrap();
        log.emit(&join(a, "carol", &clock)).await.unwrap();

        assert_eq!(log.events().await.len(), 3);
        let events = log.get_session_events(a).await.unwrap();
        assert_eq!(events, vec![join(a, "alice", &clock), join(a, "carol", &clock)]);
        assert!(
            log.get_session_events(SessionId::new())
                .await
                .unwrap()
                .is_empty()
        );
    }
}
