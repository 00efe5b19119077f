use super::state::AppState;
use crate::error::LiveError;
use crate::recording::JobStatus;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DownloadOptions {
    /// Output file relative to the recording root
    pub output_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    /// Room id, live URL, short link or profile URL
    pub identifier: String,
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<JobStatus>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /livestreams/users/:identifier/download
/// Start recording the room behind a path-safe identifier
pub async fn start_user_download(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    body: Option<Json<DownloadOptions>>,
) -> Result<impl IntoResponse, LiveError> {
    let options = body.map(|Json(options)| options).unwrap_or_default();
    start(&state, &identifier, options.output_path.as_deref()).await
}

/// POST /livestreams/download
/// Start recording for identifiers that don't fit in a path segment (full URLs)
pub async fn start_download(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> Result<impl IntoResponse, LiveError> {
    start(&state, &req.identifier, req.output_path.as_deref()).await
}

async fn start(
    state: &AppState,
    identifier: &str,
    output_path: Option<&str>,
) -> Result<impl IntoResponse, LiveError> {
    info!("Download requested for {}", identifier);

    match state.service.start_recording(identifier, output_path).await {
        Ok(accepted) => Ok((StatusCode::ACCEPTED, Json(accepted))),
        Err(e) => {
            warn!("Rejected download for {}: {}", identifier, e);
            Err(e)
        }
    }
}

/// GET /livestreams/operations/:job_id
pub async fn get_operation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatus>, LiveError> {
    state.service.get_status(&job_id).await.map(Json)
}

/// GET /livestreams/operations
pub async fn list_operations(State(state): State<AppState>) -> Json<JobListResponse> {
    let jobs = state.service.list_jobs().await;
    Json(JobListResponse {
        count: jobs.len(),
        jobs,
    })
}

/// POST /livestreams/operations/:job_id/cancel
pub async fn cancel_operation(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, LiveError> {
    let status = state.service.cancel_recording(&job_id).await?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// GET /livestreams/rooms/:identifier
/// Resolve an identifier and return the current room snapshot
pub async fn get_room(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, LiveError> {
    let lookup = state.service.room_info(&identifier).await?;
    Ok(Json(lookup))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
