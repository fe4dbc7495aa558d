//! Request errors and their JSON bodies

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No image uploaded")]
    MissingImage,

    #[error("No file uploaded")]
    MissingFile,

    #[error("Please upload exactly {expected} images")]
    FileCount { expected: usize },

    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),

    #[error("Model not loaded")]
    ModelUnavailable,

    #[error("{0}")]
    Processing(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingImage | Self::MissingFile | Self::FileCount { .. } | Self::InvalidMultipart(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::ModelUnavailable => json!({
                "error": self.to_string(),
                "ai_score": 0.0,
                "ai_generated": false,
            }),
            Self::Processing(msg) if msg.trim().is_empty() => json!({ "error": "Image processing failed" }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<deepscan::DeepscanError> for ApiError {
    fn from(e: deepscan::DeepscanError) -> Self {
        Self::Processing(e.to_string())
    }
}
