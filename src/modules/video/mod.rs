use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

// multipart framing on top of the file itself
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router<AppState> {
    let body_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    let uploads = Router::new()
        .route("/videos/{id}/upload", post(handler::upload_video))
        .route("/videos/{id}/thumbnail", post(handler::upload_thumbnail))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit));

    uploads
        .route("/videos/{id}/compression", get(handler::get_compression_status))
        .route_layer(middleware::from_fn(crate::middleware::role::uploader_guard))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}

pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/compression/queue", get(handler::get_queue_status))
        .route_layer(middleware::from_fn(crate::middleware::role::admin_guard))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
