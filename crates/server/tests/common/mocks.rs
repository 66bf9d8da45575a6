use async_trait::async_trait;
use bytes::Bytes;
use sealer_core::{Part, SessionId, SessionTracker, Upload, UploadId};
use sealer_registry::{RegistryError, RegistryResult, SessionTrackerSource};
use sealer_storage::{StorageError, StorageResult, UploadStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Upload store wrapper with switchable listing and per-upload completion failures.
pub struct FlakyUploadStore {
    inner: Arc<dyn UploadStore>,
    fail_listing: AtomicBool,
    fail_health: AtomicBool,
    fail_complete: Mutex<HashSet<UploadId>>,
}

impl FlakyUploadStore {
    pub fn new(inner: Arc<dyn UploadStore>) -> Self {
        Self {
            inner,
            fail_listing: AtomicBool::new(false),
            fail_health: AtomicBool::new(false),
            fail_complete: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_health(&self, fail: bool) {
        self.fail_health.store(fail, Ordering::SeqCst);
    }

    pub fn fail_completion_of(&self, upload_id: UploadId) {
        self.fail_complete.lock().unwrap().insert(upload_id);
    }
}

#[async_trait]
impl UploadStore for FlakyUploadStore {
    async fn create_upload(&self, session_id: SessionId) -> StorageResult<Upload> {
        self.inner.create_upload(session_id).await
    }

    async fn upload_part(
        &self,
        upload: &Upload,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<Part> {
        self.inner.upload_part(upload, part_number, data).await
    }

    async fn list_uploads(&self) -> StorageResult<Vec<Upload>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("listing timed out".to_string()));
        }
        self.inner.list_uploads().await
    }

    async fn get_upload(&self, upload_id: UploadId) -> StorageResult<Upload> {
        self.inner.get_upload(upload_id).await
    }

    async fn complete_upload(&self, upload: &Upload) -> StorageResult<()> {
        if self.fail_complete.lock().unwrap().contains(&upload.id) {
            return Err(StorageError::Unavailable(format!(
                "cannot finalize {}",
                upload.id
            )));
        }
        self.inner.complete_upload(upload).await
    }

    async fn get_recording(&self, upload_id: UploadId) -> StorageResult<Bytes> {
        self.inner.get_recording(upload_id).await
    }

    fn recording_uri(&self, upload: &Upload) -> String {
        self.inner.recording_uri(upload)
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn health_check(&self) -> StorageResult<()> {
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk detached".to_string()));
        }
        self.inner.health_check().await
    }
}

/// Tracker source that fails every call with a fresh error.
pub struct FailingTrackerSource {
    make_error: fn() -> RegistryError,
}

impl FailingTrackerSource {
    /// Every call is refused with `AccessDenied`.
    pub fn denying() -> Self {
        Self {
            make_error: || RegistryError::AccessDenied("tracker read not permitted".to_string()),
        }
    }

    /// Every call fails with a transport error.
    pub fn unavailable() -> Self {
        Self {
            make_error: || RegistryError::Unavailable("connection reset".to_string()),
        }
    }
}

#[async_trait]
impl SessionTrackerSource for FailingTrackerSource {
    async fn get_active_session_trackers(&self) -> RegistryResult<Vec<SessionTracker>> {
        Err((self.make_error)())
    }

    async fn get_session_tracker(&self, _session_id: SessionId) -> RegistryResult<SessionTracker> {
        Err((self.make_error)())
    }
}

/// Tracker source wrapper counting calls.
pub struct CountingTrackerSource {
    inner: Arc<dyn SessionTrackerSource>,
    pub snapshots: AtomicUsize,
    pub lookups: AtomicUsize,
}

impl CountingTrackerSource {
    pub fn new(inner: Arc<dyn SessionTrackerSource>) -> Self {
        Self {
            inner,
            snapshots: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionTrackerSource for CountingTrackerSource {
    async fn get_active_session_trackers(&self) -> RegistryResult<Vec<SessionTracker>> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        self.inner.get_active_session_trackers().await
    }

    async fn get_session_tracker(&self, session_id: SessionId) -> RegistryResult<SessionTracker> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_session_tracker(session_id).await
    }
}
