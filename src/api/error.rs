use crate::services::upload_coordinator::UploadError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Not all chunks received ({received}/{total})")]
    Incomplete { received: u32, total: u32 },

    #[error("Integrity failure: {0}")]
    Integrity(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::InvalidRequest(msg) => AppError::BadRequest(msg),
            UploadError::ChunkIndexOutOfRange { .. } => AppError::BadRequest(e.to_string()),
            UploadError::PayloadTooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
            UploadError::SessionNotFound => AppError::NotFound(e.to_string()),
            UploadError::IncompleteUpload { received, total } => {
                AppError::Incomplete { received, total }
            }
            UploadError::ChunkMissing(_)
            | UploadError::DecompressionFailed(_)
            | UploadError::MalformedPayload(_) => AppError::Integrity(e.to_string()),
            UploadError::Store(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body): (StatusCode, Value) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, json!({ "error": msg }))
            }
            AppError::Incomplete { received, total } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Not all chunks received",
                    "receivedChunks": received,
                    "totalChunks": total,
                }),
            ),
            AppError::Integrity(msg) => {
                tracing::error!("Upload integrity failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to reassemble upload", "details": msg }),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
