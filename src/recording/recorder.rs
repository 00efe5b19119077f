use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::segment::segment_pattern;
use crate::error::LiveError;

/// What a capture process should pull and where its segments go
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub room_id: String,
    pub source_url: String,
    pub segment_dir: PathBuf,
    pub segment_duration: Duration,
    /// Index of the first segment this process writes
    pub start_index: u32,
}

/// How a capture process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureExit {
    pub success: bool,
    pub code: Option<i32>,
}

impl From<std::process::ExitStatus> for CaptureExit {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Launches stream-copy processes
///
/// Implementations:
/// - [`FfmpegBackend`]: external ffmpeg writing MPEG-TS segments
/// - test doubles that write segment files directly
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Spawn a capture for `request`
    ///
    /// Returns once the process is running.
    async fn launch(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureProcess>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// A running capture
#[async_trait::async_trait]
pub trait CaptureProcess: Send {
    /// Wait for the process to exit on its own
    ///
    /// Must be cancel-safe: it is raced against monitor polls.
    async fn wait(&mut self) -> Result<CaptureExit>;

    /// Ask the process to finish, force-kill after `grace`, and return once it has exited
    async fn stop(&mut self, grace: Duration) -> Result<CaptureExit>;

    /// OS process id, when there is one
    fn id(&self) -> Option<u32>;
}

/// ffmpeg stream copy into fixed-duration segments
pub struct FfmpegBackend {
    ffmpeg_path: PathBuf,
}

impl FfmpegBackend {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn command(&self, request: &CaptureRequest) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "warning", "-y"])
            .args(["-rw_timeout", "15000000"])
            .arg("-i")
            .arg(&request.source_url)
            .args(["-map", "0", "-c", "copy"])
            .args(["-f", "segment"])
            .arg("-segment_time")
            .arg(request.segment_duration.as_secs().max(1).to_string())
            .args(["-segment_format", "mpegts"])
            .arg("-segment_start_number")
            .arg(request.start_index.to_string())
            .args(["-reset_timestamps", "1"])
            .arg(segment_pattern(&request.segment_dir));

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FfmpegBackend {
    async fn launch(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureProcess>> {
        let mut child = self
            .command(request)
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}", self.ffmpeg_path))?;

        if let Some(stderr) = child.stderr.take() {
            let room_id = request.room_id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("ffmpeg[{}]: {}", room_id, line);
                }
            });
        }

        Ok(Box::new(FfmpegProcess { child }))
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

struct FfmpegProcess {
    child: Child,
}

#[async_trait::async_trait]
impl CaptureProcess for FfmpegProcess {
    async fn wait(&mut self) -> Result<CaptureExit> {
        let status = self.child.wait().await?;
        Ok(status.into())
    }

    async fn stop(&mut self, grace: Duration) -> Result<CaptureExit> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(status.into());
        }

        // "q" makes ffmpeg flush the current segment and exit
        if let Some(mut stdin) = self.child.stdin.take() {
            let _ = stdin.write_all(b"q\n").await;
            let _ = stdin.flush().await;
        }

        tokio::select! {
            status = self.child.wait() => Ok(status?.into()),
            _ = tokio::time::sleep(grace) => {
                warn!("ffmpeg did not exit within {:?}, killing it", grace);
                self.child.kill().await?;
                let status = self.child.wait().await?;
                Ok(status.into())
            }
        }
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Starts captures for a job, one process at a time
pub struct SegmentRecorder {
    backend: Arc<dyn CaptureBackend>,
    segment_duration: Duration,
}

impl SegmentRecorder {
    pub fn new(backend: Arc<dyn CaptureBackend>, segment_duration: Duration) -> Self {
        Self {
            backend,
            segment_duration,
        }
    }

    /// Create the segment directory (idempotent) and launch a capture
    /// writing segments from `start_index` onward
    pub async fn start(
        &self,
        room_id: &str,
        source_url: &str,
        segment_dir: &Path,
        start_index: u32,
    ) -> Result<Box<dyn CaptureProcess>, LiveError> {
        tokio::fs::create_dir_all(segment_dir).await.map_err(|e| {
            LiveError::RecorderFailure(format!(
                "cannot create segment dir {}: {}",
                segment_dir.display(),
                e
            ))
        })?;

        let request = CaptureRequest {
            room_id: room_id.to_string(),
            source_url: source_url.to_string(),
            segment_dir: segment_dir.to_path_buf(),
            segment_duration: self.segment_duration,
            start_index,
        };

        let process = self
            .backend
            .launch(&request)
            .await
            .map_err(|e| LiveError::RecorderFailure(format!("{:#}", e)))?;

        info!(
            "Capture started via {} (pid {:?}, first segment {})",
            self.backend.name(),
            process.id(),
            start_index
        );
        Ok(process)
    }
}
