//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use sealer_core::{Part, SessionId, Upload, UploadId};

/// Multipart upload store for session recordings.
///
/// Implementations must tolerate several completers working against the same
/// backend: uploads may appear or disappear between calls, and
/// [`complete_upload`](UploadStore::complete_upload) may be invoked more than
/// once for the same upload.
#[async_trait]
pub trait UploadStore: Send + Sync + 'static {
    /// Start a new upload for a session, stamped with the store's clock.
    async fn create_upload(&self, session_id: SessionId) -> StorageResult<Upload>;

    /// Store one part of an upload.
    ///
    /// Uploading a part number twice replaces the earlier content. Fails with
    /// `UploadCompleted` once the upload has been finalized.
    async fn upload_part(
        &self,
        upload: &Upload,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<Part>;

    /// List all uploads that are not completed yet, in no particular order.
    ///
    /// Reflects backend state at call time.
    async fn list_uploads(&self) -> StorageResult<Vec<Upload>>;

    /// Fetch the current record of an upload, completed or not.
    async fn get_upload(&self, upload_id: UploadId) -> StorageResult<Upload>;

    /// Mark an upload completed and assemble its parts into a recording.
    ///
    /// Completing an already completed upload succeeds without doing anything.
    async fn complete_upload(&self, upload: &Upload) -> StorageResult<()>;

    /// Read the assembled recording of a completed upload.
    async fn get_recording(&self, upload_id: UploadId) -> StorageResult<Bytes>;

    /// Locator of the recording an upload finalizes into.
    fn recording_uri(&self, upload: &Upload) -> String;

    /// Get the name of this storage backend.
    ///
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
