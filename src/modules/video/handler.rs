use super::dto::{CompressionStatusResponse, ThumbnailResponse, UploadAcceptedResponse};
use super::service::VideoService;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::common::upload::{stage_field, UploadError};
use crate::state::AppState;
use crate::workers::queue::QueueStatus;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

const VIDEO_FIELD: &str = "video";
const THUMBNAIL_FIELD: &str = "thumbnail";

/// Upload a product video
/// The file is staged locally and compressed in the background.
#[utoipa::path(
    post,
    path = "/api/v1/videos/{id}/upload",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Upload accepted", body = ApiResponse<UploadAcceptedResponse>),
        (status = 400, description = "Bad Request"),
        (status = 413, description = "File too large"),
        (status = 415, description = "Not a video"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos",
    security(("bearer_auth" = []))
)]
pub async fn upload_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let temp_dir = state.config.temp_upload_dir.join("videos");

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return ApiError::from(UploadError::from_multipart(e, state.config.max_upload_bytes)).into_response()
            }
        };
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        info!(video_id = %id, file = ?field.file_name(), "Receiving video upload");
        let staged = match stage_field(field, &temp_dir, id, mime::VIDEO, state.config.max_upload_bytes).await {
            Ok(staged) => staged,
            Err(e) => return ApiError::from(e).into_response(),
        };

        return match VideoService::accept_upload(&state, id, staged).await {
            Ok(res) => ApiSuccess(
                ApiResponse::success(res, "Video accepted for processing"),
                StatusCode::ACCEPTED,
            )
            .into_response(),
            Err(e) => ApiError::internal(e.to_string()).into_response(),
        };
    }

    ApiError::bad_request("No video field found in multipart request").into_response()
}

/// Upload a video thumbnail
#[utoipa::path(
    post,
    path = "/api/v1/videos/{id}/thumbnail",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Thumbnail stored", body = ApiResponse<ThumbnailResponse>),
        (status = 400, description = "Bad Request"),
        (status = 404, description = "Video not found"),
        (status = 415, description = "Not an image"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos",
    security(("bearer_auth" = []))
)]
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let temp_dir = state.config.temp_upload_dir.join("images");

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return ApiError::from(UploadError::from_multipart(e, state.config.max_upload_bytes)).into_response()
            }
        };
        if field.name() != Some(THUMBNAIL_FIELD) {
            continue;
        }

        let staged = match stage_field(field, &temp_dir, id, mime::IMAGE, state.config.max_upload_bytes).await {
            Ok(staged) => staged,
            Err(e) => return ApiError::from(e).into_response(),
        };

        return match VideoService::store_thumbnail(&state, id, staged).await {
            Ok(Some(asset)) => ApiSuccess(
                ApiResponse::success(ThumbnailResponse::new(id, asset), "Thumbnail uploaded successfully"),
                StatusCode::OK,
            )
            .into_response(),
            Ok(None) => ApiError::not_found("Video not found").into_response(),
            Err(e) => ApiError::internal(e.to_string()).into_response(),
        };
    }

    ApiError::bad_request("No thumbnail field found in multipart request").into_response()
}

/// Compression state of a video
#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}/compression",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Compression status", body = ApiResponse<CompressionStatusResponse>),
        (status = 404, description = "Video not found"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Videos",
    security(("bearer_auth" = []))
)]
pub async fn get_compression_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match VideoService::compression_status(&state, id).await {
        Ok(Some(res)) => ApiSuccess(
            ApiResponse::success(res, "Compression status retrieved successfully"),
            StatusCode::OK,
        )
        .into_response(),
        Ok(None) => ApiError::not_found("Video not found").into_response(),
        Err(e) => ApiError::internal(e.to_string()).into_response(),
    }
}

/// Compression queue snapshot
#[utoipa::path(
    get,
    path = "/api/v1/admin/compression/queue",
    responses(
        (status = 200, description = "Queue status", body = ApiResponse<QueueStatus>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn get_queue_status(State(state): State<AppState>) -> impl IntoResponse {
    ApiSuccess(
        ApiResponse::success(state.queue.status(), "Queue status retrieved successfully"),
        StatusCode::OK,
    )
}
