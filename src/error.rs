//! Error kinds surfaced by the acquisition pipeline.
//!
//! Resolution-stage errors are returned synchronously from `start()`.
//! Errors raised after a job is accepted are stored in the job as a
//! [`JobFailure`] and only observed through status polling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LiveError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Could not resolve identifier: {0}")]
    UnresolvedIdentifier(String),

    #[error("Room {0} is not currently live")]
    NotLive(String),

    #[error("No stream available for room {0}")]
    NoStreamAvailable(String),

    #[error("Room {0} is already recording")]
    AlreadyRecording(String),

    #[error("Room info unavailable for {room_id}: {reason}")]
    RoomInfoUnavailable { room_id: String, reason: String },

    #[error("Recorder failure: {0}")]
    RecorderFailure(String),

    #[error("Merge failure: {0}")]
    MergeFailure(String),

    #[error("Merged partial data: {0}")]
    MergePartial(String),

    #[error("Job {0} not found")]
    JobNotFound(String),

    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),
}

/// Serialisable tag for a [`LiveError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidIdentifier,
    UnresolvedIdentifier,
    NotLive,
    NoStreamAvailable,
    AlreadyRecording,
    RoomInfoUnavailable,
    RecorderFailure,
    MergeFailure,
    MergePartial,
    JobNotFound,
    InvalidOutputPath,
}

impl LiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LiveError::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            LiveError::UnresolvedIdentifier(_) => ErrorKind::UnresolvedIdentifier,
            LiveError::NotLive(_) => ErrorKind::NotLive,
            LiveError::NoStreamAvailable(_) => ErrorKind::NoStreamAvailable,
            LiveError::AlreadyRecording(_) => ErrorKind::AlreadyRecording,
            LiveError::RoomInfoUnavailable { .. } => ErrorKind::RoomInfoUnavailable,
            LiveError::RecorderFailure(_) => ErrorKind::RecorderFailure,
            LiveError::MergeFailure(_) => ErrorKind::MergeFailure,
            LiveError::MergePartial(_) => ErrorKind::MergePartial,
            LiveError::JobNotFound(_) => ErrorKind::JobNotFound,
            LiveError::InvalidOutputPath(_) => ErrorKind::InvalidOutputPath,
        }
    }

    /// HTTP status used when the error reaches the REST layer
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidIdentifier | ErrorKind::InvalidOutputPath => StatusCode::BAD_REQUEST,
            ErrorKind::UnresolvedIdentifier | ErrorKind::JobNotFound => StatusCode::NOT_FOUND,
            ErrorKind::NotLive | ErrorKind::NoStreamAvailable | ErrorKind::AlreadyRecording => {
                StatusCode::CONFLICT
            }
            ErrorKind::RoomInfoUnavailable => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure captured into a job's terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&LiveError> for JobFailure {
    fn from(error: &LiveError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<LiveError> for JobFailure {
    fn from(error: LiveError) -> Self {
        Self::from(&error)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub code: ErrorKind,
    pub error: String,
}

impl IntoResponse for LiveError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error",
            code: self.kind(),
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
