use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::job::{JobState, JobStatus, RecordingJob};
use super::merger::{MergeReport, SegmentMerger};
use super::monitor::{MonitorVerdict, RoomStatusMonitor};
use super::recorder::{CaptureBackend, SegmentRecorder};
use super::segment::{next_index, scan_segments};
use super::settings::{MonitorSettings, RecordingSettings};
use crate::error::LiveError;
use crate::resolve::{select_variant, RoomInfo, RoomInfoProvider, RoomStatus, SelectedVariant};

const RECORD_FILE: &str = "job.json";
const SEGMENTS_DIR: &str = "segments";

/// Returned by [`JobManager::start`] once a job is accepted
#[derive(Debug, Clone, Serialize)]
pub struct StartedJob {
    pub job_id: String,
    pub run_id: Uuid,
    /// Where the merged recording will be written
    pub output_path: PathBuf,
    pub quality: String,
}

/// Owns every recording job and the tasks driving them
///
/// At most one non-terminal job exists per room. Cloning is cheap and
/// shares the same registry.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<RoomInfoProvider>,
    recorder: SegmentRecorder,
    monitor: RoomStatusMonitor,
    merger: SegmentMerger,
    settings: RecordingSettings,
    /// room id -> job entry
    registry: RwLock<HashMap<String, JobEntry>>,
}

struct JobEntry {
    job: RecordingJob,
    cancel: watch::Sender<bool>,
    state: Arc<watch::Sender<JobState>>,
    handle: Option<JoinHandle<()>>,
}

/// Fixed facts about one run, handed to its driver
#[derive(Debug, Clone)]
struct RunContext {
    room_id: String,
    run_id: Uuid,
    source_url: String,
    segment_dir: PathBuf,
    output_path: PathBuf,
}

#[derive(Debug)]
enum StopReason {
    Cancelled,
    StreamEnded(RoomStatus),
    MonitorExhausted(String),
    RecorderGaveUp(String),
}

impl JobManager {
    pub fn new(
        provider: Arc<RoomInfoProvider>,
        backend: Arc<dyn CaptureBackend>,
        settings: RecordingSettings,
        monitor: MonitorSettings,
    ) -> Self {
        let inner = Inner {
            recorder: SegmentRecorder::new(backend, settings.segment_duration),
            monitor: RoomStatusMonitor::new(Arc::clone(&provider), monitor),
            merger: SegmentMerger::new(settings.concat, settings.ffmpeg_path.clone()),
            provider,
            settings,
            registry: RwLock::new(HashMap::new()),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.inner.settings
    }

    /// Accept a recording job for `room_id`
    ///
    /// Resolution errors (not live, no stream, duplicate job, bad output
    /// path) are returned here. Everything after acceptance is reported
    /// through [`JobManager::status`].
    pub async fn start(
        &self,
        room_id: &str,
        output_path: Option<&str>,
    ) -> Result<StartedJob, LiveError> {
        if !is_room_id(room_id) {
            return Err(LiveError::InvalidIdentifier(room_id.to_string()));
        }
        let output_path = self.output_path_for(room_id, output_path)?;
        if tokio::fs::try_exists(&output_path).await.unwrap_or(true) {
            return Err(LiveError::InvalidOutputPath(format!(
                "{} already exists",
                output_path.display()
            )));
        }

        // Reserve the room before any network call so a concurrent start
        // for the same room is rejected
        let (run_id, cancel_rx) = {
            let mut registry = self.inner.registry.write().await;
            prune_expired(&mut registry, self.inner.settings.retention);

            if let Some(existing) = registry.get(room_id) {
                if !existing.job.state.is_terminal() {
                    return Err(LiveError::AlreadyRecording(room_id.to_string()));
                }
            }
            if let Some(holder) = registry
                .values()
                .find(|entry| !entry.job.state.is_terminal() && entry.job.output_path == output_path)
            {
                return Err(LiveError::InvalidOutputPath(format!(
                    "{} is in use by job {}",
                    output_path.display(),
                    holder.job.job_id
                )));
            }

            let mut job = RecordingJob::new(room_id, output_path, PathBuf::new());
            job.segment_dir = self.inner.room_dir(room_id).join(SEGMENTS_DIR).join(format!(
                "{}_{}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                &job.run_id.simple().to_string()[..8]
            ));

            let run_id = job.run_id;
            let (cancel_tx, cancel_rx) = watch::channel(false);
            let (state_tx, _) = watch::channel(JobState::Pending);
            registry.insert(
                room_id.to_string(),
                JobEntry {
                    job,
                    cancel: cancel_tx,
                    state: Arc::new(state_tx),
                    handle: None,
                },
            );
            (run_id, cancel_rx)
        };

        let (info, variant) = match self.resolve_stream(room_id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.inner.release(room_id, run_id).await;
                return Err(e);
            }
        };

        let mut registry = self.inner.registry.write().await;
        let Some(entry) = registry
            .get_mut(room_id)
            .filter(|entry| entry.job.run_id == run_id)
        else {
            return Err(LiveError::RecorderFailure(format!(
                "reservation for room {} was lost",
                room_id
            )));
        };

        let job = &mut entry.job;
        job.quality = variant.quality.clone();
        job.source_url = variant.url.clone();
        job.title = info.title.clone();
        job.host_nickname = info.host_nickname.clone();
        job.advance(JobState::Recording);
        entry.state.send_replace(job.state);

        let ctx = RunContext {
            room_id: room_id.to_string(),
            run_id,
            source_url: variant.url,
            segment_dir: job.segment_dir.clone(),
            output_path: job.output_path.clone(),
        };
        let started = StartedJob {
            job_id: job.job_id.clone(),
            run_id,
            output_path: job.output_path.clone(),
            quality: variant.quality,
        };

        info!(
            "Recording room {} ({}) at {} into {}",
            room_id,
            info.host_nickname,
            started.quality,
            started.output_path.display()
        );

        entry.handle = Some(tokio::spawn(supervise(
            Arc::clone(&self.inner),
            ctx,
            cancel_rx,
        )));
        Ok(started)
    }

    /// Current view of a job
    ///
    /// Falls back to the on-disk record of a completed job once it has left
    /// the registry.
    pub async fn status(&self, job_id: &str) -> Result<JobStatus, LiveError> {
        let job = {
            let mut registry = self.inner.registry.write().await;
            prune_expired(&mut registry, self.inner.settings.retention);
            registry.get(job_id).map(|entry| entry.job.clone())
        };

        match job {
            Some(job) => Ok(live_status(job).await),
            None => self.archived_status(job_id).await,
        }
    }

    /// All jobs still in the registry, oldest first
    pub async fn list(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<RecordingJob> = {
            let mut registry = self.inner.registry.write().await;
            prune_expired(&mut registry, self.inner.settings.retention);
            registry.values().map(|entry| entry.job.clone()).collect()
        };
        jobs.sort_by_key(|job| job.created_at);

        let mut statuses = Vec::with_capacity(jobs.len());
        for job in jobs {
            statuses.push(live_status(job).await);
        }
        statuses
    }

    /// Ask a running job to stop
    ///
    /// The capture is stopped and awaited before the recorded segments are
    /// merged. Cancelling a terminal job is a no-op.
    pub async fn cancel(&self, job_id: &str) -> Result<JobStatus, LiveError> {
        let job = {
            let mut registry = self.inner.registry.write().await;
            let entry = registry
                .get_mut(job_id)
                .ok_or_else(|| LiveError::JobNotFound(job_id.to_string()))?;

            if !entry.job.state.is_terminal() && !entry.job.cancel_requested {
                info!("Cancellation requested for job {}", job_id);
                entry.job.cancel_requested = true;
                entry.cancel.send_replace(true);
            }
            entry.job.clone()
        };

        Ok(live_status(job).await)
    }

    /// Wait until a job reaches a terminal state
    pub async fn wait(&self, job_id: &str) -> Result<JobStatus, LiveError> {
        let subscription = {
            let registry = self.inner.registry.read().await;
            registry.get(job_id).map(|entry| entry.state.subscribe())
        };

        if let Some(mut state_rx) = subscription {
            // Err only means the entry was evicted; status() handles that
            let _ = state_rx.wait_for(|state| state.is_terminal()).await;
        }
        self.status(job_id).await
    }

    /// Cancel every active job and wait for all drivers to finish
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut registry = self.inner.registry.write().await;
            registry
                .values_mut()
                .filter_map(|entry| {
                    if !entry.job.state.is_terminal() {
                        entry.job.cancel_requested = true;
                        entry.cancel.send_replace(true);
                    }
                    entry.handle.take()
                })
                .collect()
        };

        info!("Waiting for {} job(s) to wind down", handles.len());
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Job supervisor failed: {}", e);
            }
        }
    }

    async fn resolve_stream(&self, room_id: &str) -> Result<(RoomInfo, SelectedVariant), LiveError> {
        let info = self.inner.provider.fetch(room_id).await?;
        if !info.status.is_live() {
            return Err(LiveError::NotLive(room_id.to_string()));
        }
        let variant = select_variant(room_id, &info.variants)?;
        Ok((info, variant))
    }

    /// Output location under the recording root
    ///
    /// A caller-supplied path must stay inside the root and must not land on
    /// a room directory, a segment directory or a job record.
    fn output_path_for(&self, room_id: &str, requested: Option<&str>) -> Result<PathBuf, LiveError> {
        let settings = &self.inner.settings;
        let Some(raw) = requested.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(self.inner.room_dir(room_id).join(format!(
                "{}_{}.{}",
                room_id,
                Utc::now().format("%Y%m%d_%H%M%S"),
                settings.container
            )));
        };

        let invalid = || LiveError::InvalidOutputPath(raw.to_string());
        let path = Path::new(raw);
        let relative = if path.is_absolute() {
            path.strip_prefix(&settings.root).map_err(|_| invalid())?
        } else {
            path
        };

        let confined = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined || relative.file_name().is_none() || collides_with_job_files(relative) {
            return Err(invalid());
        }
        Ok(settings.root.join(relative))
    }

    async fn archived_status(&self, job_id: &str) -> Result<JobStatus, LiveError> {
        let not_found = || LiveError::JobNotFound(job_id.to_string());
        if !is_room_id(job_id) {
            return Err(not_found());
        }

        let path = self.inner.record_path(job_id);
        let bytes = tokio::fs::read(&path).await.map_err(|_| not_found())?;
        let record: RecordingJob = serde_json::from_slice(&bytes).map_err(|e| {
            warn!("Unreadable job record {}: {}", path.display(), e);
            not_found()
        })?;

        let output_exists = tokio::fs::metadata(&record.output_path).await.is_ok();
        if record.state == JobState::Completed && output_exists {
            Ok(record.status())
        } else {
            Err(not_found())
        }
    }
}

impl Inner {
    fn room_dir(&self, room_id: &str) -> PathBuf {
        self.settings.root.join(room_id)
    }

    fn record_path(&self, room_id: &str) -> PathBuf {
        self.room_dir(room_id).join(RECORD_FILE)
    }

    /// Drop a reservation whose resolution failed
    async fn release(&self, room_id: &str, run_id: Uuid) {
        let mut registry = self.registry.write().await;
        if registry
            .get(room_id)
            .is_some_and(|entry| entry.job.run_id == run_id)
        {
            registry.remove(room_id);
        }
    }

    async fn transition(&self, ctx: &RunContext, next: JobState) -> bool {
        let mut registry = self.registry.write().await;
        let Some(entry) = registry
            .get_mut(&ctx.room_id)
            .filter(|entry| entry.job.run_id == ctx.run_id)
        else {
            return false;
        };

        let from = entry.job.state;
        if entry.job.advance(next) {
            debug!("Job {}: {:?} -> {:?}", ctx.room_id, from, next);
            entry.state.send_replace(next);
            true
        } else {
            warn!("Job {}: refused transition {:?} -> {:?}", ctx.room_id, from, next);
            false
        }
    }

    /// Record the terminal state, persist it, then wake waiters
    async fn finish(&self, ctx: &RunContext, outcome: Result<MergeReport, LiveError>) {
        let (record, state_tx) = {
            let mut registry = self.registry.write().await;
            let Some(entry) = registry
                .get_mut(&ctx.room_id)
                .filter(|entry| entry.job.run_id == ctx.run_id)
            else {
                warn!("Job entry disappeared before completion");
                return;
            };

            let job = &mut entry.job;
            match outcome {
                Ok(report) => {
                    job.output_path = report.output_path.clone();
                    job.segment_count = Some(report.segments_merged);
                    job.partial = report.partial;
                    if report.partial {
                        let note = LiveError::MergePartial(format!(
                            "merged {} segments, missing {:?}",
                            report.segments_merged, report.missing
                        ));
                        job.warning = Some(note.into());
                    }
                    if !job.advance(JobState::Completed) {
                        let e = LiveError::RecorderFailure(format!(
                            "merge finished while job was {:?}",
                            job.state
                        ));
                        job.error = Some(e.into());
                        job.advance(JobState::Failed);
                    }
                }
                Err(e) => {
                    error!("Job failed: {}", e);
                    job.error = Some(e.into());
                    job.advance(JobState::Failed);
                }
            }
            (job.clone(), Arc::clone(&entry.state))
        };

        if let Err(e) = self.persist(&record).await {
            warn!("Failed to write job record: {:#}", e);
        }
        info!(
            "Job {} finished as {:?} after {:.1}s",
            record.job_id,
            record.state,
            record.elapsed_secs()
        );
        state_tx.send_replace(record.state);
    }

    async fn persist(&self, job: &RecordingJob) -> Result<()> {
        let path = self.record_path(job.room_id());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(job)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {:?}", path))
    }
}

/// Run the driver in its own task so a panic still yields a terminal state
async fn supervise(inner: Arc<Inner>, ctx: RunContext, cancel_rx: watch::Receiver<bool>) {
    let span = info_span!("job", room_id = %ctx.room_id, run_id = %ctx.run_id);

    let driver = tokio::spawn(
        drive(Arc::clone(&inner), ctx.clone(), cancel_rx).instrument(span.clone()),
    );
    let outcome = match driver.await {
        Ok(outcome) => outcome,
        Err(e) => Err(LiveError::RecorderFailure(format!(
            "job driver aborted: {}",
            e
        ))),
    };

    inner.finish(&ctx, outcome).instrument(span).await;
}

async fn drive(
    inner: Arc<Inner>,
    ctx: RunContext,
    mut cancel_rx: watch::Receiver<bool>,
) -> Result<MergeReport, LiveError> {
    let mut capture = inner
        .recorder
        .start(&ctx.room_id, &ctx.source_url, &ctx.segment_dir, 0)
        .await?;
    let mut running = true;
    let mut restarts = 0;

    // Polling starts only after the capture is confirmed running
    let reason = loop {
        tokio::select! {
            _ = cancel_rx.changed() => break StopReason::Cancelled,

            verdict = inner.monitor.next_verdict(&ctx.room_id) => match verdict {
                MonitorVerdict::Live => {}
                MonitorVerdict::Ended(status) => break StopReason::StreamEnded(status),
                MonitorVerdict::Exhausted(e) => break StopReason::MonitorExhausted(e),
            },

            exit = capture.wait(), if running => {
                running = false;
                match exit {
                    Ok(exit) => warn!("Capture exited (success={}, code={:?})", exit.success, exit.code),
                    Err(e) => warn!("Lost track of capture process: {:#}", e),
                }

                // An exit is only a hint; the monitor decides whether the stream is over.
                // A cancel during the check wins over any relaunch.
                let verdict = tokio::select! {
                    _ = cancel_rx.changed() => break StopReason::Cancelled,
                    verdict = inner.monitor.check(&ctx.room_id) => verdict,
                };
                match verdict {
                    MonitorVerdict::Live if restarts < inner.settings.max_restarts => {
                        restarts += 1;
                        let next = match scan_segments(&ctx.segment_dir).await {
                            Ok(segments) => next_index(&segments),
                            Err(e) => break StopReason::RecorderGaveUp(format!("{:#}", e)),
                        };
                        info!("Room still live, relaunching capture ({}/{})", restarts, inner.settings.max_restarts);
                        match inner.recorder.start(&ctx.room_id, &ctx.source_url, &ctx.segment_dir, next).await {
                            Ok(relaunched) => {
                                capture = relaunched;
                                running = true;
                            }
                            Err(e) => break StopReason::RecorderGaveUp(e.to_string()),
                        }
                    }
                    MonitorVerdict::Live => {
                        break StopReason::RecorderGaveUp(format!(
                            "capture exited {} times while room was live",
                            restarts + 1
                        ));
                    }
                    MonitorVerdict::Ended(status) => break StopReason::StreamEnded(status),
                    MonitorVerdict::Exhausted(e) => break StopReason::MonitorExhausted(e),
                }
            }
        }
    };

    match &reason {
        StopReason::Cancelled => info!("Job cancelled"),
        StopReason::StreamEnded(status) => info!("Stream ended (status {:?})", status),
        StopReason::MonitorExhausted(e) => warn!("Status polls exhausted, treating as ended: {}", e),
        StopReason::RecorderGaveUp(e) => warn!("Capture abandoned: {}", e),
    }

    let next = if matches!(reason, StopReason::Cancelled) {
        JobState::Cancelled
    } else {
        JobState::Monitoring
    };
    inner.transition(&ctx, next).await;

    // Merging must not start while the capture can still write
    if running {
        let exit = capture
            .stop(inner.settings.stop_grace)
            .await
            .map_err(|e| LiveError::RecorderFailure(format!("failed to stop capture: {:#}", e)))?;
        info!("Capture stopped (code={:?})", exit.code);
    }
    drop(capture);

    inner.transition(&ctx, JobState::Merging).await;
    let merged = inner.merger.merge(&ctx.segment_dir, &ctx.output_path).await;

    match (merged, reason) {
        (Err(LiveError::MergeFailure(msg)), StopReason::RecorderGaveUp(cause)) => {
            Err(LiveError::RecorderFailure(format!("{}; {}", cause, msg)))
        }
        (merged, _) => merged,
    }
}

fn is_room_id(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `relative` (under the root) would overwrite files a job owns
fn collides_with_job_files(relative: &Path) -> bool {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let room_dir = parts.len() == 1 && is_room_id(&parts[0]);
    let record = parts.last().is_some_and(|name| name == RECORD_FILE);
    let in_segments = parts
        .windows(2)
        .any(|pair| is_room_id(&pair[0]) && pair[1] == SEGMENTS_DIR);
    room_dir || record || in_segments
}

/// Evict terminal jobs older than `retention`
fn prune_expired(registry: &mut HashMap<String, JobEntry>, retention: Duration) {
    let now = Utc::now();
    registry.retain(|room_id, entry| {
        let expired = entry.job.state.is_terminal()
            && entry
                .job
                .ended_at
                .and_then(|ended| (now - ended).to_std().ok())
                .is_some_and(|age| age >= retention);
        if expired {
            debug!("Evicting job {}", room_id);
        }
        !expired
    });
}

async fn live_status(job: RecordingJob) -> JobStatus {
    let mut status = job.status();
    if !job.state.is_terminal() {
        if let Ok(segments) = scan_segments(&job.segment_dir).await {
            status.segment_count = Some(segments.len());
        }
    }
    status
}
