//! In-memory upload store.

use crate::error::{StorageError, StorageResult};
use crate::traits::UploadStore;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use sealer_core::{Clock, Part, SessionId, SystemClock, Upload, UploadId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

#[derive(Debug)]
struct StoredUpload {
    upload: Upload,
    /// Part content keyed by part number.
    data: BTreeMap<u32, Bytes>,
}

/// Process-local upload store.
///
/// Reference implementation of [`UploadStore`]. Completed uploads stay
/// queryable through [`get_upload`](UploadStore::get_upload) with their
/// recording assembled in memory.
#[derive(Debug)]
pub struct MemoryUploadStore {
    clock: Arc<dyn Clock>,
    uploads: RwLock<HashMap<UploadId, StoredUpload>>,
    recordings: RwLock<HashMap<UploadId, Bytes>>,
}

impl MemoryUploadStore {
    /// Create an empty store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping uploads with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            uploads: RwLock::new(HashMap::new()),
            recordings: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryUploadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    #[instrument(skip(self), fields(backend = "memory"))]
    async fn create_upload(&self, session_id: SessionId) -> StorageResult<Upload> {
        let upload = Upload::new(session_id, self.clock.now());
        self.uploads.write().await.insert(
            upload.id,
            StoredUpload {
                upload: upload.clone(),
                data: BTreeMap::new(),
            },
        );
        Ok(upload)
    }

    #[instrument(skip(self, upload, data), fields(backend = "memory", upload_id = %upload.id, size = data.len()))]
    async fn upload_part(
        &self,
        upload: &Upload,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<Part> {
        let mut uploads = self.uploads.write().await;
        let stored = uploads
            .get_mut(&upload.id)
            .ok_or(StorageError::NotFound(upload.id))?;
        if stored.upload.completed {
            return Err(StorageError::UploadCompleted(upload.id));
        }

        let part = Part::for_data(part_number, &data);
        stored.upload.put_part(part.clone());
        stored.data.insert(part_number, data);
        Ok(part)
    }

    async fn list_uploads(&self) -> StorageResult<Vec<Upload>> {
        Ok(self
            .uploads
            .read()
            .await
            .values()
            .filter(|s| !s.upload.completed)
            .map(|s| s.upload.clone())
            .collect())
    }

    async fn get_upload(&self, upload_id: UploadId) -> StorageResult<Upload> {
        self.uploads
            .read()
            .await
            .get(&upload_id)
            .map(|s| s.upload.clone())
            .ok_or(StorageError::NotFound(upload_id))
    }

    #[instrument(skip(self, upload), fields(backend = "memory", upload_id = %upload.id))]
    async fn complete_upload(&self, upload: &Upload) -> StorageResult<()> {
        let mut uploads = self.uploads.write().await;
        let stored = uploads
            .get_mut(&upload.id)
            .ok_or(StorageError::NotFound(upload.id))?;
        if stored.upload.completed {
            return Ok(());
        }

        let mut recording = BytesMut::new();
        for data in stored.data.values() {
            recording.extend_from_slice(data);
        }
        stored.upload.completed = true;
        stored.data.clear();
        self.recordings
            .write()
            .await
            .insert(upload.id, recording.freeze());
        Ok(())
    }

    async fn get_recording(&self, upload_id: UploadId) -> StorageResult<Bytes> {
        self.recordings
            .read()
            .await
            .get(&upload_id)
            .cloned()
            .ok_or(StorageError::RecordingNotFound(upload_id))
    }

    fn recording_uri(&self, upload: &Upload) -> String {
        format!("memory://recordings/{}", upload.id)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
