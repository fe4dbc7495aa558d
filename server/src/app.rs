//! Router construction

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::state::SharedState;

/// Default request body limit for the upload routes
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/check-image", post(routes::check_image::check_image))
        .route("/upload-hash", post(routes::hashes::upload_hash))
        .route("/compare", post(routes::hashes::compare))
        .route("/detect-ai", post(routes::hashes::detect_ai))
        .route("/health", get(routes::health::health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use burn_ndarray::NdArray;
    use deepscan::inference::{ImageScorer, Predictor};
    use deepscan::model::{DetectorConfig, ModelArtifact};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::hashing::sha256_hex;
    use crate::state::{AppState, ModelState};

    const BOUNDARY: &str = "deepscan-test-boundary";

    struct FixedScorer(f32);

    impl ImageScorer for FixedScorer {
        fn score(&self, _image: &DynamicImage) -> deepscan::Result<f32> {
            Ok(self.0)
        }
    }

    /// One multipart part; `file_name: None` makes it a plain text field
    struct Part<'a> {
        name: &'a str,
        file_name: Option<&'a str>,
        content: &'a [u8],
    }

    fn file<'a>(name: &'a str, content: &'a [u8]) -> Part<'a> {
        Part {
            name,
            file_name: Some("upload.png"),
            content,
        }
    }

    fn text<'a>(name: &'a str, value: &'a str) -> Part<'a> {
        Part {
            name,
            file_name: None,
            content: value.as_bytes(),
        }
    }

    fn app(model: ModelState) -> Router {
        build_router(Arc::new(AppState::new(model)), DEFAULT_MAX_UPLOAD_BYTES)
    }

    fn loaded(score: f32) -> ModelState {
        ModelState::Loaded(Arc::new(FixedScorer(score)))
    }

    fn png_bytes(shade: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(48, 40, |x, y| Rgb([(x * 5) as u8, (y * 6) as u8, shade]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn multipart(uri: &str, parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part.file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        part.name, file_name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
                ),
            }
            body.extend_from_slice(part.content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn upload(field: &str, content: &[u8]) -> Request<Body> {
        multipart("/check-image", &[file(field, content)])
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn health_request() -> Request<Body> {
        Request::get("/health").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_model_state() {
        let (status, body) = send(app(ModelState::Unavailable), health_request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model_loaded"], false);

        let (status, body) = send(app(loaded(0.3)), health_request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_loaded"], true);
    }

    #[tokio::test]
    async fn test_health_after_loading_saved_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("model").join("best_model");
        let config = DetectorConfig::new().with_input_size(32);
        let model = config.init::<NdArray>(&Default::default());
        ModelArtifact::new(&base).save(&model, &config).unwrap();

        let state = ModelState::load(&base);
        assert!(state.is_loaded());

        let router = app(state);
        let (status, body) = send(router.clone(), health_request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_loaded"], true);

        let (status, body) = send(router, upload("image", &png_bytes(90))).await;
        assert_eq!(status, StatusCode::OK);
        assert!((0.0..=1.0).contains(&body["ai_score"].as_f64().unwrap()));
    }

    #[tokio::test]
    async fn test_missing_field_is_bad_request() {
        let (status, body) = send(app(loaded(0.9)), upload("file", &png_bytes(90))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No image uploaded");
    }

    #[tokio::test]
    async fn test_missing_field_checked_before_model_state() {
        let (status, body) = send(app(ModelState::Unavailable), upload("file", &png_bytes(90))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No image uploaded");
    }

    #[tokio::test]
    async fn test_text_field_named_image_is_not_an_upload() {
        let req = multipart("/check-image", &[text("image", "hello")]);
        let (status, body) = send(app(ModelState::Unavailable), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No image uploaded");

        let req = multipart("/check-image", &[text("image", "hello")]);
        let (status, _) = send(app(loaded(0.9)), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_file_found_after_other_parts() {
        let png = png_bytes(90);
        let req = multipart(
            "/check-image",
            &[text("image", "hello"), text("note", "x"), file("image", &png)],
        );
        let (status, body) = send(app(loaded(0.2)), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ai_generated"], false);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_bad_request() {
        let req = Request::post("/check-image")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(app(ModelState::Unavailable), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unloaded_model_returns_fallback() {
        let (status, body) = send(app(ModelState::Unavailable), upload("image", &png_bytes(90))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Model not loaded");
        assert_eq!(body["ai_score"], 0.0);
        assert_eq!(body["ai_generated"], false);
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_processing_error() {
        let (status, body) = send(app(loaded(0.9)), upload("image", b"definitely not an image")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verdict_fields() {
        let (status, body) = send(app(loaded(0.75)), upload("image", &png_bytes(90))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ai_score"], 0.75);
        assert_eq!(body["ai_generated"], true);
        assert_eq!(body["confidence"], 50.0);

        let (_, body) = send(app(loaded(0.1)), upload("image", &png_bytes(90))).await;
        assert_eq!(body["ai_generated"], false);
        assert_eq!(body["confidence"], 80.0);
    }

    #[tokio::test]
    async fn test_real_model_end_to_end() {
        let device = Default::default();
        let model = DetectorConfig::new().with_input_size(32).init::<NdArray>(&device);
        let predictor = Predictor::new(model, 32, device);

        let (status, body) = send(
            app(ModelState::Loaded(Arc::new(predictor))),
            upload("image", &png_bytes(90)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let score = body["ai_score"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(body["ai_generated"].as_bool().unwrap(), score > 0.5);
        let expected = ((score - 0.5).abs() * 200.0 * 100.0).round() / 100.0;
        assert!((body["confidence"].as_f64().unwrap() - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let router = build_router(Arc::new(AppState::new(loaded(0.9))), 64);
        let response = router.oneshot(upload("image", &png_bytes(90))).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_upload_hash_without_detection() {
        let png = png_bytes(10);
        let req = multipart("/upload-hash", &[file("image", &png)]);
        let (status, body) = send(app(ModelState::Unavailable), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["hash"], sha256_hex(&png));
        assert!(body["ai_result"].is_null());
    }

    #[tokio::test]
    async fn test_upload_hash_with_detection() {
        let png = png_bytes(10);
        let req = multipart("/upload-hash", &[file("image", &png), text("detectAI", "true")]);
        let (status, body) = send(app(loaded(0.9)), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ai_result"]["ai_score"], 0.9);
        assert_eq!(body["ai_result"]["ai_generated"], true);
        assert!(body["ai_result"].get("error").is_none());

        let req = multipart("/upload-hash", &[file("image", &png), text("detectAI", "true")]);
        let (status, body) = send(app(ModelState::Unavailable), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ai_result"]["error"], "AI service unavailable");
        assert_eq!(body["ai_result"]["ai_score"], 0.0);
        assert_eq!(body["ai_result"]["ai_generated"], false);
    }

    #[tokio::test]
    async fn test_upload_hash_requires_file() {
        let req = multipart("/upload-hash", &[text("image", "hello")]);
        let (status, body) = send(app(loaded(0.9)), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_compare_identical_and_different() {
        let a = png_bytes(10);
        let b = png_bytes(200);

        let req = multipart("/compare", &[file("images", &a), file("images", &a)]);
        let (status, body) = send(app(ModelState::Unavailable), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["match"], true);
        assert_eq!(body["hash1"], body["hash2"]);

        let req = multipart("/compare", &[file("images", &a), file("images", &b)]);
        let (_, body) = send(app(ModelState::Unavailable), req).await;
        assert_eq!(body["match"], false);
        assert_eq!(body["hash1"], sha256_hex(&a));
        assert_eq!(body["hash2"], sha256_hex(&b));
    }

    #[tokio::test]
    async fn test_compare_requires_exactly_two_files() {
        let a = png_bytes(10);
        for parts in [
            vec![file("images", &a)],
            vec![file("images", &a), file("images", &a), file("images", &a)],
            vec![file("images", &a), text("images", "not a file")],
        ] {
            let (status, body) = send(app(ModelState::Unavailable), multipart("/compare", &parts)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Please upload exactly 2 images");
        }
    }

    #[tokio::test]
    async fn test_detect_ai_flattens_verdict() {
        let png = png_bytes(50);
        let (status, body) = send(app(loaded(0.25)), multipart("/detect-ai", &[file("image", &png)])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["hash"], sha256_hex(&png));
        assert_eq!(body["ai_score"], 0.25);
        assert_eq!(body["ai_generated"], false);
        assert_eq!(body["confidence"], 50.0);
    }

    #[tokio::test]
    async fn test_detect_ai_falls_back_on_failure() {
        let garbage = b"not an image".as_slice();
        let (status, body) = send(app(loaded(0.9)), multipart("/detect-ai", &[file("image", garbage)])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hash"], sha256_hex(garbage));
        assert_eq!(body["error"], "AI service unavailable");
        assert_eq!(body["ai_score"], 0.0);
        assert_eq!(body["ai_generated"], false);
        assert!(body.get("confidence").is_none());
    }
}
