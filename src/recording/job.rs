use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::JobFailure;

/// Lifecycle of a recording job
///
/// ```text
/// PENDING -> RECORDING -> MONITORING -> MERGING -> COMPLETED | FAILED
///                 \            \
///                  +-> CANCELLED -> MERGING
/// ```
/// FAILED is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Recording,
    /// End of stream (or cancellation) decided; capture is being stopped
    Monitoring,
    Cancelled,
    Merging,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn can_advance_to(&self, next: JobState) -> bool {
        use JobState::*;

        match (*self, next) {
            (Pending, Recording)
            | (Recording, Monitoring)
            | (Recording, Cancelled)
            | (Monitoring, Cancelled)
            | (Monitoring, Merging)
            | (Cancelled, Merging)
            | (Merging, Completed) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// One recording run for a room
///
/// The job id is the room id. `run_id` tells apart successive runs for the
/// same room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingJob {
    pub job_id: String,
    pub run_id: Uuid,
    pub state: JobState,
    pub output_path: PathBuf,
    pub segment_dir: PathBuf,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub host_nickname: String,
    /// Stream URLs carry short-lived tokens; they never leave memory
    #[serde(skip)]
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_requested: bool,
    #[serde(default)]
    pub partial: bool,
    pub segment_count: Option<usize>,
    /// Non-fatal problem on a completed job (e.g. gaps in the segment run)
    pub warning: Option<JobFailure>,
    pub error: Option<JobFailure>,
}

impl RecordingJob {
    pub fn new(room_id: &str, output_path: PathBuf, segment_dir: PathBuf) -> Self {
        Self {
            job_id: room_id.to_string(),
            run_id: Uuid::new_v4(),
            state: JobState::Pending,
            output_path,
            segment_dir,
            quality: String::new(),
            title: String::new(),
            host_nickname: String::new(),
            source_url: String::new(),
            created_at: Utc::now(),
            ended_at: None,
            cancel_requested: false,
            partial: false,
            segment_count: None,
            warning: None,
            error: None,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.job_id
    }

    /// Move to `next` if the state graph allows it
    ///
    /// Returns false (leaving the job untouched) for backward or skipping
    /// transitions.
    pub fn advance(&mut self, next: JobState) -> bool {
        if !self.state.can_advance_to(next) {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        true
    }

    /// Seconds since creation, frozen once terminal
    pub fn elapsed_secs(&self) -> f64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            job_id: self.job_id.clone(),
            state: self.state,
            output_path: Some(self.output_path.display().to_string()),
            quality: self.quality.clone(),
            title: self.title.clone(),
            elapsed_secs: self.elapsed_secs(),
            segment_count: self.segment_count,
            partial: self.partial,
            cancel_requested: self.cancel_requested,
            created_at: self.created_at,
            ended_at: self.ended_at,
            warning: self.warning.clone(),
            error: self.error.clone(),
        }
    }
}

/// Point-in-time view of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    pub quality: String,
    pub title: String,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_count: Option<usize>,
    pub partial: bool,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> RecordingJob {
        RecordingJob::new("42", PathBuf::from("out.ts"), PathBuf::from("segments"))
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = job();
        for next in [
            JobState::Recording,
            JobState::Monitoring,
            JobState::Merging,
            JobState::Completed,
        ] {
            assert!(job.advance(next), "to {:?}", next);
        }
        assert!(job.ended_at.is_some());
    }

    #[test]
    fn test_cancel_routes_through_merging() {
        let mut job = job();
        assert!(job.advance(JobState::Recording));
        assert!(job.advance(JobState::Cancelled));
        assert!(!job.advance(JobState::Completed));
        assert!(job.advance(JobState::Merging));
        assert!(job.advance(JobState::Failed));
    }

    #[test]
    fn test_no_backward_transitions() {
        let mut job = job();
        assert!(job.advance(JobState::Recording));
        assert!(job.advance(JobState::Monitoring));
        assert!(!job.advance(JobState::Recording));
        assert!(!job.advance(JobState::Pending));
        assert_eq!(job.state, JobState::Monitoring);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job();
        assert!(job.advance(JobState::Failed));
        assert!(!job.advance(JobState::Failed));
        assert!(!job.advance(JobState::Recording));
        assert!(!JobState::Pending.can_advance_to(JobState::Cancelled));
    }

    #[test]
    fn test_state_serializes_screaming_case() {
        let json = serde_json::to_string(&JobState::Monitoring).unwrap();
        assert_eq!(json, "\"MONITORING\"");
    }

    #[test]
    fn test_record_omits_source_url() {
        let mut job = job();
        job.source_url = "http://cdn/stream.flv?token=secret".to_string();
        let json = serde_json::to_string(&job).unwrap();
        assert!(!json.contains("secret"));
    }
}
