//! HTTP API for starting and tracking livestream recordings
//!
//! - POST /livestreams/users/:identifier/download - Start a recording
//! - POST /livestreams/download - Start a recording (identifier in body)
//! - GET /livestreams/operations - List jobs
//! - GET /livestreams/operations/:job_id - Job status
//! - POST /livestreams/operations/:job_id/cancel - Cancel a job
//! - GET /livestreams/rooms/:identifier - Room snapshot
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
