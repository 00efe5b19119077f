//! Operations exposed to the REST layer

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::error::LiveError;
use crate::recording::{
    CaptureBackend, FfmpegBackend, JobManager, JobStatus, MonitorSettings, RecordingSettings,
};
use crate::resolve::{IdentifierResolver, RoomIdentifier, RoomInfo, RoomInfoProvider};
use crate::upstream::{HttpPlatform, LivePlatform, UpstreamSettings};

/// Acknowledgement of an accepted recording
#[derive(Debug, Clone, Serialize)]
pub struct RecordingAccepted {
    pub status: &'static str,
    pub job_id: String,
    pub output_path: PathBuf,
    pub quality: String,
    pub method: crate::resolve::ResolutionMethod,
}

/// Room snapshot together with how the identifier was resolved
#[derive(Debug, Clone, Serialize)]
pub struct RoomLookup {
    pub identifier: RoomIdentifier,
    pub room: RoomInfo,
}

/// Identifier resolution plus job management behind one handle
#[derive(Clone)]
pub struct LiveService {
    resolver: Arc<IdentifierResolver>,
    provider: Arc<RoomInfoProvider>,
    jobs: JobManager,
}

impl LiveService {
    pub fn new(
        platform: Arc<dyn LivePlatform>,
        backend: Arc<dyn CaptureBackend>,
        upstream: &UpstreamSettings,
        recording: RecordingSettings,
        monitor: MonitorSettings,
    ) -> Self {
        let resolver = Arc::new(IdentifierResolver::new(Arc::clone(&platform), upstream));
        let provider = Arc::new(RoomInfoProvider::new(platform));
        let jobs = JobManager::new(Arc::clone(&provider), backend, recording, monitor);

        Self {
            resolver,
            provider,
            jobs,
        }
    }

    /// Production wiring: HTTP upstream client and ffmpeg capture
    pub fn from_config(config: &Config) -> Result<Self> {
        let upstream = config.upstream_settings();
        let recording = config.recording_settings();
        let platform: Arc<dyn LivePlatform> = Arc::new(HttpPlatform::new(upstream.clone())?);
        let backend: Arc<dyn CaptureBackend> =
            Arc::new(FfmpegBackend::new(recording.ffmpeg_path.clone()));

        info!(
            "Recording root {}, {}s segments, concat via {:?}",
            recording.root.display(),
            recording.segment_duration.as_secs(),
            recording.concat
        );
        Ok(Self::new(
            platform,
            backend,
            &upstream,
            recording,
            config.monitor_settings(),
        ))
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Resolve `identifier` and start recording its room
    pub async fn start_recording(
        &self,
        identifier: &str,
        output_path: Option<&str>,
    ) -> Result<RecordingAccepted, LiveError> {
        let resolved = self.resolver.resolve(identifier).await?;
        let started = self.jobs.start(&resolved.room_id, output_path).await?;

        Ok(RecordingAccepted {
            status: "pending",
            job_id: started.job_id,
            output_path: started.output_path,
            quality: started.quality,
            method: resolved.method,
        })
    }

    pub async fn get_status(&self, job_id: &str) -> Result<JobStatus, LiveError> {
        self.jobs.status(job_id).await
    }

    pub async fn cancel_recording(&self, job_id: &str) -> Result<JobStatus, LiveError> {
        self.jobs.cancel(job_id).await
    }

    pub async fn list_jobs(&self) -> Vec<JobStatus> {
        self.jobs.list().await
    }

    pub async fn room_info(&self, identifier: &str) -> Result<RoomLookup, LiveError> {
        let identifier = self.resolver.resolve(identifier).await?;
        let room = self.provider.fetch(&identifier.room_id).await?;
        Ok(RoomLookup { identifier, room })
    }

    pub async fn shutdown(&self) {
        self.jobs.shutdown().await;
    }
}
