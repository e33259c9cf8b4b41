use axum::{
    extract::multipart::{Field, MultipartError},
    http::StatusCode,
};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{error, info};
use uuid::Uuid;

use crate::common::response::ApiError;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid content type '{0}'")]
    InvalidContentType(String),

    #[error("File exceeds the {0} byte upload limit")]
    TooLarge(usize),

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Upload stream interrupted: {0}")]
    Stream(String),

    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// A body cut off by the request size limit is reported as too large,
    /// anything else as a broken stream.
    pub fn from_multipart(e: MultipartError, max_bytes: usize) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge(max_bytes)
        } else {
            UploadError::Stream(e.body_text())
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        let status = match e {
            UploadError::InvalidContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Empty | UploadError::Stream(_) => StatusCode::BAD_REQUEST,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(e.to_string(), status)
    }
}

/// A multipart file written to the temp directory.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub original_filename: String,
}

fn extension_for(file_name: &str, content_type: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .or_else(|| {
            mime_guess::get_mime_extensions_str(content_type)
                .and_then(|exts| exts.first())
                .map(|ext| ext.to_string())
        })
        .unwrap_or_else(|| "bin".to_string())
}

/// Stream `field` into `<dir>/<entity_id>_<uuid>.<ext>`.
///
/// `media_type` is the required top-level MIME type (`video`, `image`). A
/// partially written file is removed when the stream fails or the limit is hit.
pub async fn stage_field(
    mut field: Field<'_>,
    dir: &Path,
    entity_id: Uuid,
    media_type: mime::Name<'_>,
    max_bytes: usize,
) -> Result<StagedFile, UploadError> {
    let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
    let parsed: Option<mime::Mime> = content_type.parse().ok();
    if parsed.as_ref().map(|m| m.type_()) != Some(media_type) {
        return Err(UploadError::InvalidContentType(content_type));
    }

    let original_filename = field.file_name().unwrap_or("upload").to_string();
    let extension = extension_for(&original_filename, &content_type);

    fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}_{}.{}", entity_id, Uuid::new_v4().simple(), extension));

    let written = write_stream(&mut field, &path, max_bytes).await;
    let size_bytes = match written {
        Ok(0) => {
            discard(&path).await;
            return Err(UploadError::Empty);
        }
        Ok(size) => size,
        Err(e) => {
            discard(&path).await;
            return Err(e);
        }
    };

    info!(
        entity_id = %entity_id,
        file = %original_filename,
        size = size_bytes,
        path = %path.display(),
        "📦 Upload staged"
    );

    Ok(StagedFile { path, original_filename })
}

async fn write_stream(field: &mut Field<'_>, path: &Path, max_bytes: usize) -> Result<u64, UploadError> {
    let mut file = fs::File::create(path).await?;
    let mut total: usize = 0;

    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadError::from_multipart(e, max_bytes))?;
        total += chunk.len();
        if total > max_bytes {
            return Err(UploadError::TooLarge(max_bytes));
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(total as u64)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}
