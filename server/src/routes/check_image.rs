//! Image classification endpoint

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use deepscan::{ImageScorer, Verdict};
use tracing::{debug, error, info};

use crate::error::ApiError;
use crate::state::SharedState;
use crate::upload::UploadForm;

/// Multipart file field carrying the upload
pub const IMAGE_FIELD: &str = "image";

/// POST /check-image - score an uploaded image
///
/// Input validation runs before the model check, so a request without an
/// image file gets 400 even when no model is loaded.
pub async fn check_image(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Verdict>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::InvalidMultipart(e.body_text()))?;
    let form = UploadForm::read(multipart).await?;
    let image = form.file(IMAGE_FIELD).ok_or(ApiError::MissingImage)?;
    debug!("Received {:?} ({} bytes)", image.file_name, image.bytes.len());

    let scorer = state.model.scorer().ok_or(ApiError::ModelUnavailable)?;
    let verdict = score_upload(scorer, image.bytes.clone()).await?;

    info!(
        "Scored upload: ai_score={:.4} ai_generated={}",
        verdict.ai_score, verdict.ai_generated
    );
    Ok(Json(verdict))
}

/// Run the model on the blocking pool
pub async fn score_upload(scorer: Arc<dyn ImageScorer>, bytes: Bytes) -> Result<Verdict, ApiError> {
    tokio::task::spawn_blocking(move || scorer.verdict_bytes(&bytes))
        .await
        .map_err(|e| {
            error!("Inference task failed: {}", e);
            ApiError::Processing(format!("Inference task failed: {}", e))
        })?
        .map_err(|e| {
            error!("Failed to process image: {}", e);
            ApiError::from(e)
        })
}
