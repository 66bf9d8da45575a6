//! Local filesystem upload store.
//!
//! Layout under the root directory:
//!
//! ```text
//! uploads/<upload_id>/upload.json       upload record (parts, completion flag)
//! uploads/<upload_id>/parts/<n>.part    part content
//! recordings/<upload_id>.rec            assembled recording
//! ```
//!
//! Every file is written to a uniquely named temp file, fsynced and renamed
//! into place, so readers never observe partial writes. Several completers
//! (in this or other processes) may finalize the same upload concurrently;
//! they assemble identical recordings and the last rename wins.

use crate::error::{StorageError, StorageResult};
use crate::traits::UploadStore;
use async_trait::async_trait;
use bytes::Bytes;
use sealer_core::{Clock, Part, SessionId, SystemClock, Upload, UploadId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

const MANIFEST_FILE: &str = "upload.json";
const PARTS_DIR: &str = "parts";
const UPLOADS_DIR: &str = "uploads";
const RECORDINGS_DIR: &str = "recordings";

/// Local filesystem upload store.
#[derive(Debug)]
pub struct FilesystemUploadStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    /// Serializes read-modify-write cycles on upload records within this process.
    manifest_lock: Mutex<()>,
}

impl FilesystemUploadStore {
    /// Create a new filesystem store rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_clock(root, Arc::new(SystemClock)).await
    }

    /// Create a new filesystem store stamping uploads with `clock`.
    pub async fn with_clock(root: impl AsRef<Path>, clock: Arc<dyn Clock>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(UPLOADS_DIR)).await?;
        fs::create_dir_all(root.join(RECORDINGS_DIR)).await?;
        Ok(Self {
            root,
            clock,
            manifest_lock: Mutex::new(()),
        })
    }

    fn upload_dir(&self, upload_id: UploadId) -> PathBuf {
        self.root.join(UPLOADS_DIR).join(upload_id.to_string())
    }

    fn manifest_path(&self, upload_id: UploadId) -> PathBuf {
        self.upload_dir(upload_id).join(MANIFEST_FILE)
    }

    fn part_path(&self, upload_id: UploadId, part_number: u32) -> PathBuf {
        self.upload_dir(upload_id)
            .join(PARTS_DIR)
            .join(format!("{part_number:010}.part"))
    }

    fn recording_path(&self, upload_id: UploadId) -> PathBuf {
        self.root
            .join(RECORDINGS_DIR)
            .join(format!("{upload_id}.rec"))
    }

    async fn read_manifest(&self, upload_id: UploadId) -> StorageResult<Upload> {
        let path = self.manifest_path(upload_id);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(upload_id)
            } else {
                StorageError::Io(e)
            }
        })?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn write_manifest(&self, upload: &Upload) -> StorageResult<()> {
        let data = serde_json::to_vec_pretty(upload)?;
        write_atomic(&self.manifest_path(upload.id), &data).await
    }

    /// Concatenate the upload's parts into its recording file.
    async fn assemble(&self, upload: &Upload) -> StorageResult<()> {
        let final_path = self.recording_path(upload.id);
        let temp_path = temp_path_for(&final_path);

        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            for part in &upload.parts {
                let path = self.part_path(upload.id, part.number);
                let data = fs::read(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        StorageError::Corrupt {
                            path: path.display().to_string(),
                            reason: "part file missing".to_string(),
                        }
                    } else {
                        StorageError::Io(e)
                    }
                })?;
                file.write_all(&data).await?;
            }
            file.sync_all().await?;
            fs::rename(&temp_path, &final_path).await?;
            Ok(())
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }
}

#[async_trait]
impl UploadStore for FilesystemUploadStore {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn create_upload(&self, session_id: SessionId) -> StorageResult<Upload> {
        let upload = Upload::new(session_id, self.clock.now());
        fs::create_dir_all(self.upload_dir(upload.id).join(PARTS_DIR)).await?;
        self.write_manifest(&upload).await?;
        Ok(upload)
    }

    #[instrument(skip(self, upload, data), fields(backend = "filesystem", upload_id = %upload.id, size = data.len()))]
    async fn upload_part(
        &self,
        upload: &Upload,
        part_number: u32,
        data: Bytes,
    ) -> StorageResult<Part> {
        let _guard = self.manifest_lock.lock().await;

        let mut current = self.read_manifest(upload.id).await?;
        if current.completed {
            return Err(StorageError::UploadCompleted(upload.id));
        }

        let part = Part::for_data(part_number, &data);
        write_atomic(&self.part_path(upload.id, part_number), &data).await?;
        current.put_part(part.clone());
        self.write_manifest(&current).await?;
        Ok(part)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list_uploads(&self) -> StorageResult<Vec<Upload>> {
        let mut uploads = Vec::new();
        let mut entries = fs::read_dir(self.root.join(UPLOADS_DIR)).await?;

        while let Some(entry) = entries.next_entry().await? {
            // Use file_type() instead of path.is_dir() to avoid following symlinks.
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Ok(upload_id) = UploadId::parse(&name.to_string_lossy()) else {
                continue;
            };

            match self.read_manifest(upload_id).await {
                Ok(upload) if !upload.completed => uploads.push(upload),
                Ok(_) => {}
                // Removed or not yet written by a concurrent writer.
                Err(StorageError::NotFound(_)) => {}
                Err(StorageError::Corrupt { path, reason }) => {
                    tracing::warn!(path = %path, reason = %reason, "Skipping unreadable upload record");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(uploads)
    }

    async fn get_upload(&self, upload_id: UploadId) -> StorageResult<Upload> {
        self.read_manifest(upload_id).await
    }

    #[instrument(skip(self, upload), fields(backend = "filesystem", upload_id = %upload.id))]
    async fn complete_upload(&self, upload: &Upload) -> StorageResult<()> {
        let _guard = self.manifest_lock.lock().await;

        let mut current = match self.read_manifest(upload.id).await {
            Ok(current) => current,
            Err(StorageError::NotFound(id))
                if fs::try_exists(self.recording_path(id)).await.unwrap_or(false) =>
            {
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if current.completed {
            return Ok(());
        }

        if let Err(e) = self.assemble(&current).await {
            // Another completer may have finalized and cleaned up under us.
            if matches!(self.read_manifest(upload.id).await, Ok(u) if u.completed) {
                return Ok(());
            }
            return Err(e);
        }

        current.completed = true;
        self.write_manifest(&current).await?;

        let parts_dir = self.upload_dir(upload.id).join(PARTS_DIR);
        if let Err(e) = fs::remove_dir_all(&parts_dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                upload_id = %upload.id,
                error = %e,
                "Failed to remove parts of completed upload"
            );
        }

        Ok(())
    }

    async fn get_recording(&self, upload_id: UploadId) -> StorageResult<Bytes> {
        let data = fs::read(self.recording_path(upload_id))
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::RecordingNotFound(upload_id)
                } else {
                    StorageError::Io(e)
                }
            })?;
        Ok(Bytes::from(data))
    }

    fn recording_uri(&self, upload: &Upload) -> String {
        format!("file://{}", self.recording_path(upload.id).display())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {}", e),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    // Use UUID to avoid conflicts during concurrent writes to the same path
    let temp_name = format!(".tmp.{}", Uuid::new_v4());
    path.with_file_name(
        path.file_name()
            .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
            .unwrap_or_else(|| temp_name.clone()),
    )
}

/// Write to temp file with unique name, fsync, then rename for atomicity.
async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp_path = temp_path_for(path);
    {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
    }
    fs::rename(&temp_path, path).await?;
    Ok(())
}
