// Shared fakes for integration tests
//
// FakePlatform serves canned payloads instead of the live platform API and
// FakeBackend writes segment files instead of spawning ffmpeg.

#![allow(dead_code)]

use anyhow::Result;
use live_recorder::recording::{
    segment_path, CaptureBackend, CaptureExit, CaptureProcess, CaptureRequest, ConcatMode,
    MonitorSettings, RecordingSettings,
};
use live_recorder::upstream::{LivePlatform, UpstreamError, UpstreamSettings, UserProfile};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ============================================================================
// Upstream platform
// ============================================================================

#[derive(Default)]
pub struct FakePlatform {
    rooms: Mutex<HashMap<String, Value>>,
    webcast_rooms: Mutex<HashMap<String, Value>>,
    webcast_ids: Mutex<HashMap<String, String>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
    room_failures: AtomicUsize,
    room_delay: Mutex<Duration>,
    webcast_id_failures: AtomicUsize,
    calls: AtomicUsize,
    room_calls: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_room(&self, room_id: &str, payload: Value) {
        self.rooms
            .lock()
            .unwrap()
            .insert(room_id.to_string(), payload);
    }

    pub fn set_webcast_room(&self, room_id: &str, payload: Value) {
        self.webcast_rooms
            .lock()
            .unwrap()
            .insert(room_id.to_string(), payload);
    }

    pub fn add_webcast_id(&self, url: &str, room_id: &str) {
        self.webcast_ids
            .lock()
            .unwrap()
            .insert(url.to_string(), room_id.to_string());
    }

    pub fn add_profile(&self, sec_user_id: &str, profile: UserProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(sec_user_id.to_string(), profile);
    }

    /// Make the next `n` primary room lookups fail transiently
    pub fn fail_room_lookups(&self, n: usize) {
        self.room_failures.store(n, Ordering::SeqCst);
    }

    /// Hold every later primary room lookup for `delay`
    pub fn delay_room_lookups(&self, delay: Duration) {
        *self.room_delay.lock().unwrap() = delay;
    }

    /// Make the next `n` webcast-id lookups fail transiently
    pub fn fail_webcast_id_lookups(&self, n: usize) {
        self.webcast_id_failures.store(n, Ordering::SeqCst);
    }

    /// Every upstream call made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn room_calls(&self) -> usize {
        self.room_calls.load(Ordering::SeqCst)
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait::async_trait]
impl LivePlatform for FakePlatform {
    async fn room_by_id(&self, room_id: &str) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.room_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.room_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if take_failure(&self.room_failures) {
            return Err(UpstreamError::Transient("connection reset".to_string()));
        }
        self.rooms
            .lock()
            .unwrap()
            .get(room_id)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(room_id.to_string()))
    }

    async fn webcast_room(&self, web_rid: &str) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.webcast_rooms
            .lock()
            .unwrap()
            .get(web_rid)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(web_rid.to_string()))
    }

    async fn resolve_webcast_id(&self, url: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.webcast_id_failures) {
            return Err(UpstreamError::Transient("timed out".to_string()));
        }
        self.webcast_ids
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(url.to_string()))
    }

    async fn user_profile(&self, sec_user_id: &str) -> Result<UserProfile, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .unwrap()
            .get(sec_user_id)
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(sec_user_id.to_string()))
    }
}

/// Primary room payload with FLV renditions
pub fn room_payload(status: i64, variants: &[(&str, &str)]) -> Value {
    let flv: BTreeMap<&str, &str> = variants.iter().copied().collect();
    json!({
        "status_code": 0,
        "data": {"room": {
            "status": status,
            "title": "Test stream",
            "user_count": 10,
            "owner": {"nickname": "tester"},
            "stream_url": {"flv_pull_url": flv}
        }}
    })
}

pub fn live_room() -> Value {
    room_payload(2, &[("HD1", "http://cdn.test/hd.flv"), ("SD1", "http://cdn.test/sd.flv")])
}

pub fn ended_room() -> Value {
    room_payload(4, &[])
}

// ============================================================================
// Capture backend
// ============================================================================

/// Writes `segment-<index>\n` files at a fixed pace
pub struct FakeBackend {
    segment_every: Duration,
    /// Exit on its own after writing this many segments
    exit_after: Option<u32>,
    launches: AtomicUsize,
    running: Arc<AtomicUsize>,
    start_indices: Mutex<Vec<u32>>,
}

impl FakeBackend {
    pub fn new(segment_every: Duration) -> Arc<Self> {
        Arc::new(Self {
            segment_every,
            exit_after: None,
            launches: AtomicUsize::new(0),
            running: Arc::new(AtomicUsize::new(0)),
            start_indices: Mutex::new(Vec::new()),
        })
    }

    pub fn exiting_after(segment_every: Duration, segments: u32) -> Arc<Self> {
        Arc::new(Self {
            segment_every,
            exit_after: Some(segments),
            launches: AtomicUsize::new(0),
            running: Arc::new(AtomicUsize::new(0)),
            start_indices: Mutex::new(Vec::new()),
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Captures that have not exited yet
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start_indices(&self) -> Vec<u32> {
        self.start_indices.lock().unwrap().clone()
    }
}

struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FakeBackend {
    async fn launch(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureProcess>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.start_indices.lock().unwrap().push(request.start_index);
        self.running.fetch_add(1, Ordering::SeqCst);

        let guard = RunningGuard(Arc::clone(&self.running));
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let dir = request.segment_dir.clone();
        let start = request.start_index;
        let every = self.segment_every;
        let exit_after = self.exit_after;

        let task = tokio::spawn(async move {
            let _guard = guard;
            let mut written = 0;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(every) => {
                        let index = start + written;
                        let _ = tokio::fs::write(
                            segment_path(&dir, index),
                            format!("segment-{}\n", index),
                        )
                        .await;
                        written += 1;
                        if exit_after.is_some_and(|n| written >= n) {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Box::new(FakeProcess {
            stop: Some(stop_tx),
            task: Some(task),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeProcess {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait::async_trait]
impl CaptureProcess for FakeProcess {
    async fn wait(&mut self) -> Result<CaptureExit> {
        if let Some(task) = self.task.as_mut() {
            task.await?;
            self.task = None;
        }
        Ok(CaptureExit {
            success: true,
            code: Some(0),
        })
    }

    async fn stop(&mut self, _grace: Duration) -> Result<CaptureExit> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.wait().await
    }

    fn id(&self) -> Option<u32> {
        None
    }
}

impl Drop for FakeProcess {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

pub fn recording_settings(root: &Path) -> RecordingSettings {
    RecordingSettings {
        root: root.to_path_buf(),
        segment_duration: Duration::from_millis(20),
        concat: ConcatMode::Binary,
        stop_grace: Duration::from_secs(1),
        max_restarts: 0,
        ..RecordingSettings::default()
    }
}

/// Monitor that stays quiet unless a test shortens the interval
pub fn quiet_monitor() -> MonitorSettings {
    MonitorSettings {
        poll_interval: Duration::from_secs(60),
        max_attempts: 2,
        backoff: Duration::from_millis(10),
    }
}

pub fn upstream_settings() -> UpstreamSettings {
    UpstreamSettings {
        resolve_backoff: Duration::from_millis(5),
        ..UpstreamSettings::default()
    }
}
