use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::infrastructure::storage::{StorageBackend, StoredAsset};
use crate::modules::storage_mode::dto::{StorageModeResponse, UpdateStorageModeRequest};
use crate::modules::storage_mode::model::StorageMode;
use crate::modules::video::dto::{CompressionStatusResponse, ThumbnailResponse, UploadAcceptedResponse};
use crate::modules::video::model::CompressionStatus;
use crate::workers::queue::QueueStatus;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::video::handler::upload_video,
        crate::modules::video::handler::upload_thumbnail,
        crate::modules::video::handler::get_compression_status,
        crate::modules::video::handler::get_queue_status,
        crate::modules::storage_mode::handler::get_storage_mode,
        crate::modules::storage_mode::handler::update_storage_mode,
    ),
    components(
        schemas(
            UploadAcceptedResponse, ThumbnailResponse, CompressionStatusResponse, CompressionStatus,
            StorageBackend, StoredAsset, QueueStatus,
            StorageMode, StorageModeResponse, UpdateStorageModeRequest,
        )
    ),
    tags(
        (name = "Videos", description = "Product video ingestion"),
        (name = "Admin", description = "Storage and queue administration")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
