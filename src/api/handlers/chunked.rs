use crate::AppState;
use crate::api::error::AppError;
use crate::services::upload_coordinator::{
    CompleteUploadRequest, SessionStatusResponse, StartUploadRequest, StartUploadResponse,
    UploadChunkRequest, UploadChunkResponse,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[utoipa::path(
    post,
    path = "/chunked/start",
    request_body = StartUploadRequest,
    responses(
        (status = 200, description = "Upload session created", body = StartUploadResponse),
        (status = 400, description = "Invalid totalChunks or missing persistentId"),
        (status = 413, description = "Declared size above the limit")
    ),
    tag = "chunked"
)]
pub async fn start_upload(
    State(state): State<AppState>,
    Json(req): Json<StartUploadRequest>,
) -> Result<Json<StartUploadResponse>, AppError> {
    Ok(Json(state.coordinator.start(req).await?))
}

#[utoipa::path(
    post,
    path = "/chunked/upload",
    request_body = UploadChunkRequest,
    responses(
        (status = 200, description = "Chunk stored", body = UploadChunkResponse),
        (status = 400, description = "Chunk index out of range"),
        (status = 404, description = "Session not found or expired")
    ),
    tag = "chunked"
)]
pub async fn upload_chunk(
    State(state): State<AppState>,
    Json(req): Json<UploadChunkRequest>,
) -> Result<Json<UploadChunkResponse>, AppError> {
    Ok(Json(state.coordinator.upload_chunk(req).await?))
}

/// Responds with whatever the ingestion step returned, status and body.
#[utoipa::path(
    post,
    path = "/chunked/complete",
    request_body = CompleteUploadRequest,
    responses(
        (status = 200, description = "Ingestion result, passed through unchanged"),
        (status = 400, description = "Not all chunks received"),
        (status = 404, description = "Session not found or expired"),
        (status = 500, description = "Reassembly failed")
    ),
    tag = "chunked"
)]
pub async fn complete_upload(
    State(state): State<AppState>,
    Json(req): Json<CompleteUploadRequest>,
) -> Result<Response, AppError> {
    let res = state.coordinator.complete(&req.session_id).await?;
    let status = StatusCode::from_u16(res.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(res.body)).into_response())
}

#[utoipa::path(
    get,
    path = "/chunked/status/{session_id}",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Session progress", body = SessionStatusResponse),
        (status = 404, description = "Session not found or expired")
    ),
    tag = "chunked"
)]
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, AppError> {
    Ok(Json(state.coordinator.status(&session_id).await?))
}
