use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::infrastructure::storage::{StorageBackend, StorageBackends, StorageError, StoredAsset};
use crate::modules::storage_mode::service::StorageModeRegistry;
use crate::modules::video::model::CompressionStatus;
use crate::modules::video::repository::{EntityStatusStore, StatusUpdate};
use crate::workers::transcoder::{CompressionResult, TranscodeError, TranscodeParams, Transcoder};

pub const VIDEO_FOLDER: &str = "videos";

/// One uploaded video waiting to be compressed and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionJob {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub working_path: PathBuf,
    pub delete_source_on_success: bool,
}

impl IngestionJob {
    /// The transcode output sits next to the source as `<stem>_compressed.mp4`.
    pub fn new(id: Uuid, source_path: PathBuf) -> Self {
        let stem = source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| id.to_string());
        let working_path = source_path.with_file_name(format!("{stem}_compressed.mp4"));

        Self {
            id,
            source_path,
            working_path,
            delete_source_on_success: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub status: CompressionStatus,
    pub asset: StoredAsset,
    pub original_size_bytes: u64,
    pub compressed_size_bytes: u64,
}

pub struct IngestionPipeline {
    transcoder: Arc<dyn Transcoder>,
    storage: StorageBackends,
    modes: Arc<StorageModeRegistry>,
    statuses: Arc<dyn EntityStatusStore>,
    params: TranscodeParams,
}

impl IngestionPipeline {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        storage: StorageBackends,
        modes: Arc<StorageModeRegistry>,
        statuses: Arc<dyn EntityStatusStore>,
        params: TranscodeParams,
    ) -> Self {
        Self {
            transcoder,
            storage,
            modes,
            statuses,
            params,
        }
    }

    /// Drive one job to a terminal status. Only the queue worker calls this.
    pub async fn run(&self, job: IngestionJob) -> Result<PipelineOutcome, PipelineError> {
        let id = job.id;
        info!(video_id = %id, source = %job.source_path.display(), "🎥 Processing video");

        self.persist(id, StatusUpdate::processing()).await;
        let previous = self.previous_asset(id).await;

        let result = match self.compress(&job).await {
            Ok(result) => result,
            Err(e) => {
                // files stay in place for inspection
                error!(video_id = %id, error = %e, "❌ Transcode failed");
                self.persist(id, StatusUpdate::error()).await;
                return Err(e.into());
            }
        };

        let final_path = if result.used_original {
            job.source_path.as_path()
        } else {
            job.working_path.as_path()
        };

        let use_remote = self.modes.should_use_remote().await;
        let asset = match self.storage.put_with_fallback(use_remote, final_path, VIDEO_FOLDER).await {
            Ok(asset) => asset,
            Err(e) => {
                error!(video_id = %id, error = %e, "❌ Failed to store video");
                self.persist(id, StatusUpdate::error()).await;
                return Err(e.into());
            }
        };

        let status = if result.used_original {
            CompressionStatus::Skipped
        } else {
            CompressionStatus::Completed
        };

        self.persist(
            id,
            StatusUpdate::finished(
                status,
                asset.clone(),
                result.original_size_bytes,
                result.compressed_size_bytes,
            ),
        )
        .await;

        self.cleanup(&job, final_path, &asset).await;

        if let Some(previous) = previous.filter(|p| *p != asset) {
            self.storage.delete_asset(&previous).await;
        }

        info!(
            video_id = %id,
            status = %status,
            url = %asset.url,
            backend = %asset.backend,
            original_size = result.original_size_bytes,
            compressed_size = result.compressed_size_bytes,
            "✅ Video ingested"
        );

        Ok(PipelineOutcome {
            status,
            asset,
            original_size_bytes: result.original_size_bytes,
            compressed_size_bytes: result.compressed_size_bytes,
        })
    }

    async fn compress(&self, job: &IngestionJob) -> Result<CompressionResult, TranscodeError> {
        if self.transcoder.is_available().await {
            return self
                .transcoder
                .transcode(&job.source_path, &job.working_path, &self.params)
                .await;
        }

        warn!(video_id = %job.id, "Transcoder unavailable, storing original as-is");
        let size = match fs::metadata(&job.source_path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TranscodeError::SourceMissing(job.source_path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(CompressionResult::original(&job.source_path, size, 0.0, None))
    }

    async fn previous_asset(&self, id: Uuid) -> Option<StoredAsset> {
        match self.statuses.get(id).await {
            Ok(Some(record)) => self
                .storage
                .resolve(record.final_url.as_deref(), record.storage_backend),
            Ok(None) => None,
            Err(e) => {
                warn!(video_id = %id, error = %e, "Could not read previous asset");
                None
            }
        }
    }

    /// Status writes never undo work that already happened.
    async fn persist(&self, id: Uuid, update: StatusUpdate) {
        let status = update.status;
        if let Err(e) = self.statuses.set_status(id, update).await {
            error!(video_id = %id, status = %status, error = %e, "Failed to persist compression status");
        }
    }

    async fn cleanup(&self, job: &IngestionJob, final_path: &Path, asset: &StoredAsset) {
        // a local put moved `final_path` into the served directory
        let kept = (asset.backend == StorageBackend::Local).then_some(final_path);

        if kept != Some(job.working_path.as_path()) {
            remove_if_exists(&job.working_path).await;
        }
        if job.delete_source_on_success && kept != Some(job.source_path.as_path()) {
            remove_if_exists(&job.source_path).await;
        }
    }
}

async fn remove_if_exists(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "🧹 Removed temp file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
    }
}
