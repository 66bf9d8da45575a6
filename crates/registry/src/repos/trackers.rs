//! Session tracker source.

use crate::error::RegistryResult;
use async_trait::async_trait;
use sealer_core::{SessionId, SessionTracker};

/// Read access to the registry of live sessions.
#[async_trait]
pub trait SessionTrackerSource: Send + Sync {
    /// List every tracker that is active right now.
    ///
    /// Either the full set is returned or the call fails; a partial listing
    /// would let callers finalize uploads of live sessions.
    async fn get_active_session_trackers(&self) -> RegistryResult<Vec<SessionTracker>>;

    /// Look up the tracker of one session.
    ///
    /// Returns `NotFound` when the tracker is absent or expired.
    async fn get_session_tracker(&self, session_id: SessionId) -> RegistryResult<SessionTracker>;
}
