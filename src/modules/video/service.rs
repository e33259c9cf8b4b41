use anyhow::{anyhow, Result};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{CompressionStatusResponse, UploadAcceptedResponse};
use super::model::CompressionStatus;
use super::repository::EntityStatusStore;
use crate::common::upload::StagedFile;
use crate::infrastructure::storage::{StorageBackend, StoredAsset};
use crate::state::AppState;
use crate::workers::pipeline::IngestionJob;

pub const THUMBNAIL_FOLDER: &str = "thumbnails";

pub struct VideoService;

impl VideoService {
    /// Record the upload as pending and hand the staged file to the queue.
    pub async fn accept_upload(state: &AppState, id: Uuid, staged: StagedFile) -> Result<UploadAcceptedResponse> {
        if let Err(e) = state.videos.mark_pending(id, &staged.original_filename).await {
            discard(&staged).await;
            return Err(anyhow!("Failed to record upload: {}", e));
        }

        let queue_position = state.queue.enqueue(IngestionJob::new(id, staged.path));

        Ok(UploadAcceptedResponse {
            video_id: id,
            status: CompressionStatus::Pending,
            queue_position,
        })
    }

    /// Store a thumbnail for an existing video. `Ok(None)` when the video is unknown.
    pub async fn store_thumbnail(state: &AppState, id: Uuid, staged: StagedFile) -> Result<Option<StoredAsset>> {
        let Some(record) = state.videos.get(id).await? else {
            discard(&staged).await;
            return Ok(None);
        };
        let previous = state
            .storage
            .resolve(record.thumbnail_url.as_deref(), record.thumbnail_backend);

        let use_remote = state.storage_mode.should_use_remote().await;
        let asset = match state
            .storage
            .put_with_fallback(use_remote, &staged.path, THUMBNAIL_FOLDER)
            .await
        {
            Ok(asset) => asset,
            Err(e) => {
                discard(&staged).await;
                return Err(anyhow!("Failed to store thumbnail: {}", e));
            }
        };

        // the local store moved the file, a remote put left the temp copy behind
        if asset.backend == StorageBackend::Remote {
            discard(&staged).await;
        }

        if let Err(e) = state.videos.set_thumbnail(id, &asset).await {
            // nothing references the new copy yet
            state.storage.delete_asset(&asset).await;
            return Err(anyhow!("Failed to record thumbnail: {}", e));
        }

        if let Some(previous) = previous.filter(|p| *p != asset) {
            state.storage.delete_asset(&previous).await;
        }

        info!(video_id = %id, url = %asset.url, backend = %asset.backend, "🖼️ Thumbnail stored");
        Ok(Some(asset))
    }

    pub async fn compression_status(state: &AppState, id: Uuid) -> Result<Option<CompressionStatusResponse>> {
        let record = state.videos.get(id).await?;
        Ok(record.map(CompressionStatusResponse::from))
    }
}

async fn discard(staged: &StagedFile) {
    if let Err(e) = fs::remove_file(&staged.path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %staged.path.display(), error = %e, "Failed to remove staged upload");
        }
    }
}
