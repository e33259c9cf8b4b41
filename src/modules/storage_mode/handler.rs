use super::dto::{StorageModeResponse, UpdateStorageModeRequest};
use super::model::StorageMode;
use crate::common::response::{ApiError, ApiResponse, ApiSuccess};
use crate::middleware::auth::TokenClaims;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};

/// Current storage mode
#[utoipa::path(
    get,
    path = "/api/v1/admin/storage-mode",
    responses(
        (status = 200, description = "Current storage mode", body = ApiResponse<StorageModeResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn get_storage_mode(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.storage_mode.snapshot().await;
    let res = StorageModeResponse::new(config, state.storage_mode.remote_configured());
    ApiSuccess(ApiResponse::success(res, "Storage mode retrieved successfully"), StatusCode::OK)
}

/// Switch where new uploads are stored
#[utoipa::path(
    put,
    path = "/api/v1/admin/storage-mode",
    request_body = UpdateStorageModeRequest,
    responses(
        (status = 200, description = "Storage mode updated", body = ApiResponse<StorageModeResponse>),
        (status = 400, description = "Unknown mode"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn update_storage_mode(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<UpdateStorageModeRequest>,
) -> impl IntoResponse {
    let mode: StorageMode = match req.mode.parse() {
        Ok(mode) => mode,
        Err(e) => return ApiError::bad_request(e).into_response(),
    };

    match state.storage_mode.set_mode(mode, &claims.sub).await {
        Ok(config) => {
            let res = StorageModeResponse::new(config, state.storage_mode.remote_configured());
            ApiSuccess(ApiResponse::success(res, "Storage mode updated successfully"), StatusCode::OK).into_response()
        }
        Err(e) => ApiError::internal(e.to_string()).into_response(),
    }
}
