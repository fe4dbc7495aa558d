//! Upload hashing and comparison endpoints
//!
//! Stateless: uploads are hashed in memory and never stored.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use deepscan::Verdict;
use serde::Serialize;
use tracing::{info, warn};

use super::check_image::{score_upload, IMAGE_FIELD};
use crate::error::ApiError;
use crate::hashing::sha256_hex;
use crate::state::SharedState;
use crate::upload::UploadForm;

/// Multipart file field for `/compare`
pub const COMPARE_FIELD: &str = "images";

/// Text field that turns on detection for `/upload-hash`
pub const DETECT_FLAG_FIELD: &str = "detectAI";

const UNAVAILABLE_MESSAGE: &str = "AI service unavailable";

/// Detection outcome embedded in gateway responses.
///
/// Detection never fails the request: without a usable model the body carries
/// the fixed fallback (`ai_score` 0, not AI-generated) plus an `error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub ai_score: f64,
    pub ai_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Detection {
    fn unavailable() -> Self {
        Self {
            ai_score: 0.0,
            ai_generated: false,
            confidence: None,
            error: Some(UNAVAILABLE_MESSAGE.to_string()),
        }
    }
}

impl From<Verdict> for Detection {
    fn from(v: Verdict) -> Self {
        Self {
            ai_score: v.ai_score,
            ai_generated: v.ai_generated,
            confidence: Some(v.confidence),
            error: None,
        }
    }
}

async fn detect(state: &SharedState, bytes: axum::body::Bytes) -> Detection {
    let Some(scorer) = state.model.scorer() else {
        warn!("Detection requested but no model is loaded");
        return Detection::unavailable();
    };
    match score_upload(scorer, bytes).await {
        Ok(verdict) => verdict.into(),
        Err(e) => {
            warn!("Detection failed, returning fallback: {}", e);
            Detection::unavailable()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadHashResponse {
    pub status: &'static str,
    pub hash: String,
    pub ai_result: Option<Detection>,
}

/// POST /upload-hash - SHA-256 of the `image` file, optionally with detection
pub async fn upload_hash(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadHashResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::InvalidMultipart(e.body_text()))?;
    let form = UploadForm::read(multipart).await?;
    let image = form.file(IMAGE_FIELD).ok_or(ApiError::MissingFile)?;

    let hash = sha256_hex(&image.bytes);
    let ai_result = if form.text(DETECT_FLAG_FIELD) == Some("true") {
        Some(detect(&state, image.bytes.clone()).await)
    } else {
        None
    };

    info!("Hashed {:?}: {}", image.file_name, hash);
    Ok(Json(UploadHashResponse {
        status: "success",
        hash,
        ai_result,
    }))
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub status: &'static str,
    pub hash1: String,
    pub hash2: String,
    #[serde(rename = "match")]
    pub matches: bool,
}

/// POST /compare - byte-identity check of exactly two `images` files
pub async fn compare(multipart: Result<Multipart, MultipartRejection>) -> Result<Json<CompareResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::InvalidMultipart(e.body_text()))?;
    let form = UploadForm::read(multipart).await?;

    let files = form.files(COMPARE_FIELD);
    let [first, second] = files.as_slice() else {
        return Err(ApiError::FileCount { expected: 2 });
    };

    let hash1 = sha256_hex(&first.bytes);
    let hash2 = sha256_hex(&second.bytes);
    let matches = hash1 == hash2;

    info!("Compared {:?} and {:?}: match={}", first.file_name, second.file_name, matches);
    Ok(Json(CompareResponse {
        status: "success",
        hash1,
        hash2,
        matches,
    }))
}

#[derive(Debug, Serialize)]
pub struct DetectAiResponse {
    pub status: &'static str,
    pub hash: String,
    #[serde(flatten)]
    pub detection: Detection,
}

/// POST /detect-ai - detection plus hash for the `image` file
pub async fn detect_ai(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectAiResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::InvalidMultipart(e.body_text()))?;
    let form = UploadForm::read(multipart).await?;
    let image = form.file(IMAGE_FIELD).ok_or(ApiError::MissingFile)?;

    let detection = detect(&state, image.bytes.clone()).await;
    Ok(Json(DetectAiResponse {
        status: "success",
        hash: sha256_hex(&image.bytes),
        detection,
    }))
}
