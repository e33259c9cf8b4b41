use crate::docs::ApiDoc;
use crate::state::AppState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn configure_routes(state: AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let root = state.config.local_storage_root.clone();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", axum::routing::get(|| async { "ok" }))
        .nest("/api/v1", crate::modules::video::router(state.clone()))
        .nest(
            "/api/v1/admin",
            crate::modules::storage_mode::router(state.clone()).merge(crate::modules::video::admin_router(state)),
        )
        .nest_service("/videos", ServeDir::new(root.join("videos")))
        .nest_service("/thumbnails", ServeDir::new(root.join("thumbnails")))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use crate::app::create_app;
    use crate::infrastructure::storage::StorageBackend;
    use crate::middleware::auth::testing::token_for;
    use crate::modules::storage_mode::model::StorageMode;
    use crate::modules::video::model::CompressionStatus;
    use crate::modules::video::repository::EntityStatusStore;
    use crate::state::testing::TestApp;
    use crate::workers::pipeline::testing::{FakeOutput, FakeTranscoder, HarnessBuilder};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "reelboundary";

    async fn test_app(mode: StorageMode, max_upload_bytes: usize) -> TestApp {
        let harness = HarnessBuilder::new(Arc::new(FakeTranscoder::new(FakeOutput::Shrink(0.5))))
            .mode(mode)
            .build()
            .await;
        TestApp::new(harness, max_upload_bytes)
    }

    fn router(app: &TestApp) -> Router {
        create_app(app.state.clone())
    }

    fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, token: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut req = Request::post(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        req.body(Body::from(body)).unwrap()
    }

    fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"));
        match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_terminal(app: &TestApp, id: Uuid) {
        for _ in 0..300 {
            // the worker clears `current` only after temp cleanup
            if !app.harness.statuses.terminal_writes(id).is_empty() && !app.state.queue.status().is_processing {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("video {id} never reached a terminal status");
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let res = router(&app)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_requires_token() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let uri = format!("/api/v1/videos/{}/upload", Uuid::new_v4());
        let body = multipart_body("video", "clip.mp4", "video/mp4", b"data");

        let res = router(&app).oneshot(upload_request(&uri, None, body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_rejects_buyer_role() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let uri = format!("/api/v1/videos/{}/upload", Uuid::new_v4());
        let token = token_for("buyer-1", "CUSTOMER");
        let body = multipart_body("video", "clip.mp4", "video/mp4", b"data");

        let res = router(&app).oneshot(upload_request(&uri, Some(&token), body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn seller_upload_is_accepted_and_compressed_in_background() {
        let app = test_app(StorageMode::Remote, 1024 * 1024).await;
        let id = Uuid::new_v4();
        let token = token_for("seller-9", "SELLER");
        let body = multipart_body("video", "clip.mp4", "video/mp4", &[9u8; 2048]);

        let res = router(&app)
            .oneshot(upload_request(&format!("/api/v1/videos/{id}/upload"), Some(&token), body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        let json = json_body(res).await;
        assert_eq!(json["data"]["status"], "pending");
        assert!(json["data"]["queue_position"].as_u64().unwrap() >= 1);

        wait_terminal(&app, id).await;

        let res = router(&app)
            .oneshot(authed("GET", &format!("/api/v1/videos/{id}/compression"), &token, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await["data"].clone();
        assert_eq!(data["status"], "completed");
        assert_eq!(data["original_size_bytes"], 2048);
        assert_eq!(data["compressed_size_bytes"], 1024);
        assert_eq!(data["savings_percent"], 50.0);
        assert_eq!(data["storage_backend"], "remote");
        assert!(data["final_url"].as_str().unwrap().starts_with("https://cdn.example.net/videos/"));

        let temp_left = std::fs::read_dir(app.state.config.temp_upload_dir.join("videos"))
            .unwrap()
            .count();
        assert_eq!(temp_left, 0);

        app.cancel.cancel();
    }

    #[tokio::test]
    async fn upload_rejects_non_video_content() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let token = token_for("seller-9", "SELLER");
        let body = multipart_body("video", "notes.txt", "text/plain", b"hello");
        let uri = format!("/api/v1/videos/{}/upload", Uuid::new_v4());

        let res = router(&app).oneshot(upload_request(&uri, Some(&token), body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(app.state.queue.status().queue_length, 0);
    }

    #[tokio::test]
    async fn upload_over_limit_is_rejected_and_cleaned_up() {
        let app = test_app(StorageMode::Remote, 16).await;
        let token = token_for("seller-9", "SELLER");
        let body = multipart_body("video", "big.mp4", "video/mp4", &[0u8; 100]);
        let uri = format!("/api/v1/videos/{}/upload", Uuid::new_v4());

        let res = router(&app).oneshot(upload_request(&uri, Some(&token), body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let staged = std::fs::read_dir(app.state.config.temp_upload_dir.join("videos"))
            .map(|dir| dir.count())
            .unwrap_or(0);
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn chunked_body_over_request_limit_is_too_large() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let token = token_for("seller-9", "SELLER");

        // a skipped field eats the multipart allowance, so the request limit
        // trips while the video itself is still under the upload limit
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"notes\"\r\n\r\n{}\r\n",
            "n".repeat(66_000)
        )
        .into_bytes();
        body.extend(multipart_body("video", "clip.mp4", "video/mp4", &[1u8; 1000]));
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = body.chunks(4096).map(|c| Ok(c.to_vec())).collect();

        let uri = format!("/api/v1/videos/{}/upload", Uuid::new_v4());
        let req = Request::post(&uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        let res = router(&app).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let staged = std::fs::read_dir(app.state.config.temp_upload_dir.join("videos"))
            .map(|dir| dir.count())
            .unwrap_or(0);
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn upload_without_video_field_is_bad_request() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let token = token_for("seller-9", "SELLER");
        let body = multipart_body("attachment", "clip.mp4", "video/mp4", b"data");
        let uri = format!("/api/v1/videos/{}/upload", Uuid::new_v4());

        let res = router(&app).oneshot(upload_request(&uri, Some(&token), body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn compression_status_of_unknown_video_is_not_found() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let token = token_for("seller-9", "SELLER");
        let uri = format!("/api/v1/videos/{}/compression", Uuid::new_v4());

        let res = router(&app).oneshot(authed("GET", &uri, &token, None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_switches_storage_mode() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let admin = token_for("admin-1", "ADMIN");

        let res = router(&app)
            .oneshot(authed("PUT", "/api/v1/admin/storage-mode", &admin, Some(json!({ "mode": "local" }))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await["data"].clone();
        assert_eq!(data["mode"], "local");
        assert_eq!(data["updated_by"], "admin-1");
        assert_eq!(data["effective_backend"], "local");

        assert_eq!(app.state.storage_mode.current_mode().await, StorageMode::Local);

        let res = router(&app)
            .oneshot(authed("GET", "/api/v1/admin/storage-mode", &admin, None))
            .await
            .unwrap();
        assert_eq!(json_body(res).await["data"]["mode"], "local");
    }

    #[tokio::test]
    async fn unknown_storage_mode_is_rejected() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let admin = token_for("admin-1", "ADMIN");

        let res = router(&app)
            .oneshot(authed("PUT", "/api/v1/admin/storage-mode", &admin, Some(json!({ "mode": "tape" }))))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app.state.storage_mode.current_mode().await, StorageMode::Remote);
    }

    #[tokio::test]
    async fn admin_routes_reject_sellers() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let seller = token_for("seller-9", "SELLER");

        for uri in ["/api/v1/admin/storage-mode", "/api/v1/admin/compression/queue"] {
            let res = router(&app).oneshot(authed("GET", uri, &seller, None)).await.unwrap();
            assert_eq!(res.status(), StatusCode::FORBIDDEN, "{uri}");
        }
    }

    #[tokio::test]
    async fn queue_status_is_visible_to_admins() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let admin = token_for("admin-1", "ADMIN");

        let res = router(&app)
            .oneshot(authed("GET", "/api/v1/admin/compression/queue", &admin, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await["data"].clone();
        assert_eq!(data["queue_length"], 0);
        assert_eq!(data["is_processing"], false);
    }

    #[tokio::test]
    async fn thumbnail_is_stored_locally_and_served() {
        let app = test_app(StorageMode::Local, 1024).await;
        let id = Uuid::new_v4();
        app.state.videos.mark_pending(id, "clip.mp4").await.unwrap();
        let token = token_for("seller-9", "SELLER");
        let body = multipart_body("thumbnail", "cover.png", "image/png", b"\x89PNG fake");

        let res = router(&app)
            .oneshot(upload_request(&format!("/api/v1/videos/{id}/thumbnail"), Some(&token), body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let data = json_body(res).await["data"].clone();
        assert_eq!(data["storage_backend"], "local");
        let url = data["thumbnail_url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/thumbnails/"));

        let record = app.state.videos.get(id).await.unwrap().unwrap();
        assert_eq!(record.thumbnail_backend, Some(StorageBackend::Local));
        assert_eq!(record.status, CompressionStatus::Pending);

        let res = router(&app)
            .oneshot(Request::get(&url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\x89PNG fake");
    }

    #[tokio::test]
    async fn thumbnail_replacement_removes_previous_remote_copy() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let id = Uuid::new_v4();
        app.state.videos.mark_pending(id, "clip.mp4").await.unwrap();
        let token = token_for("seller-9", "SELLER");

        let mut urls = Vec::new();
        for _ in 0..2 {
            let body = multipart_body("thumbnail", "cover.jpg", "image/jpeg", b"jpeg");
            let res = router(&app)
                .oneshot(upload_request(&format!("/api/v1/videos/{id}/thumbnail"), Some(&token), body))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            urls.push(json_body(res).await["data"]["thumbnail_url"].as_str().unwrap().to_string());
        }

        assert_ne!(urls[0], urls[1]);
        assert_eq!(app.harness.remote.deletes.lock().unwrap().as_slice(), [urls[0].clone()]);
        let staged = std::fs::read_dir(app.state.config.temp_upload_dir.join("images")).unwrap().count();
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn thumbnail_is_removed_again_when_it_cannot_be_recorded() {
        let app = test_app(StorageMode::Remote, 1024).await;
        let id = Uuid::new_v4();
        app.state.videos.mark_pending(id, "clip.mp4").await.unwrap();
        app.harness
            .statuses
            .fail_thumbnail_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let token = token_for("seller-9", "SELLER");
        let body = multipart_body("thumbnail", "cover.jpg", "image/jpeg", b"jpeg");

        let res = router(&app)
            .oneshot(upload_request(&format!("/api/v1/videos/{id}/thumbnail"), Some(&token), body))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let puts = app.harness.remote.puts.lock().unwrap().clone();
        assert_eq!(puts.len(), 1);
        assert_eq!(
            app.harness.remote.deletes.lock().unwrap().as_slice(),
            [format!("https://cdn.example.net/{}", puts[0])]
        );
        let record = app.state.videos.get(id).await.unwrap().unwrap();
        assert_eq!(record.thumbnail_url, None);
    }

    #[tokio::test]
    async fn thumbnail_for_unknown_video_is_not_found() {
        let app = test_app(StorageMode::Local, 1024).await;
        let token = token_for("seller-9", "SELLER");
        let body = multipart_body("thumbnail", "cover.png", "image/png", b"png");
        let uri = format!("/api/v1/videos/{}/thumbnail", Uuid::new_v4());

        let res = router(&app).oneshot(upload_request(&uri, Some(&token), body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
