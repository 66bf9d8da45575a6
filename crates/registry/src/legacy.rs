//! Tracker source reproducing an older registry's permission model.
//!
//! Registries that predate per-kind tracker permissions refuse to disclose
//! trackers of some session kinds. They answer permission-denied both for a
//! lookup of such a tracker and for a lookup of a session they know nothing
//! about, and leave them out of listings. Callers cannot tell a hidden live
//! session from an absent one; trackers of other kinds stay fully visible.

use crate::error::{RegistryError, RegistryResult};
use crate::repos::SessionTrackerSource;
use async_trait::async_trait;
use sealer_core::{SessionId, SessionKind, SessionTracker};
use std::sync::Arc;

pub struct LegacyTrackerSource {
    inner: Arc<dyn SessionTrackerSource>,
    restricted_kinds: Vec<SessionKind>,
}

impl LegacyTrackerSource {
    pub fn new(inner: Arc<dyn SessionTrackerSource>, restricted_kinds: Vec<SessionKind>) -> Self {
        Self {
            inner,
            restricted_kinds,
        }
    }

    fn is_restricted(&self, kind: SessionKind) -> bool {
        self.restricted_kinds.contains(&kind)
    }
}

impl std::fmt::Debug for LegacyTrackerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyTrackerSource")
            .field("restricted_kinds", &self.restricted_kinds)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionTrackerSource for LegacyTrackerSource {
    async fn get_active_session_trackers(&self) -> RegistryResult<Vec<SessionTracker>> {
        let mut trackers = self.inner.get_active_session_trackers().await?;
        let before = trackers.len();
        trackers.retain(|t| !self.is_restricted(t.kind));
        if trackers.len() < before {
            tracing::debug!(
                hidden = before - trackers.len(),
                "Restricted session trackers left out of listing"
            );
        }
        Ok(trackers)
    }

    async fn get_session_tracker(&self, session_id: SessionId) -> RegistryResult<SessionTracker> {
        match self.inner.get_session_tracker(session_id).await {
            Ok(tracker) if self.is_restricted(tracker.kind) => Err(RegistryError::AccessDenied(
                format!("{} session tracker {}", tracker.kind, session_id),
            )),
            Ok(tracker) => Ok(tracker),
            Err(RegistryError::NotFound(_)) => Err(RegistryError::AccessDenied(format!(
                "session tracker {session_id}"
            ))),
            Err(e) => Err(e),
        }
    }
}
