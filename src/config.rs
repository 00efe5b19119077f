use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::recording::{ConcatMode, MonitorSettings, RecordingSettings};
use crate::upstream::UpstreamSettings;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub root: String,
    pub ffmpeg_path: String,
    pub segment_secs: u64,
    pub container: String,
    pub concat: ConcatMode,
    pub stop_grace_secs: u64,
    pub max_restarts: u32,
    pub retention_secs: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let defaults = RecordingSettings::default();
        Self {
            root: defaults.root.display().to_string(),
            ffmpeg_path: defaults.ffmpeg_path.display().to_string(),
            segment_secs: defaults.segment_duration.as_secs(),
            container: defaults.container,
            concat: defaults.concat,
            stop_grace_secs: defaults.stop_grace.as_secs(),
            max_restarts: defaults.max_restarts,
            retention_secs: defaults.retention.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            max_attempts: 3,
            backoff_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub user_agent: String,
    pub referer: String,
    pub cookie: String,
    pub proxy: Option<String>,
    pub timeout_secs: u64,
    pub resolve_attempts: u32,
    pub resolve_backoff_ms: u64,
    pub live_base_url: String,
    pub room_info_url: String,
    pub webcast_url: String,
    pub profile_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let defaults = UpstreamSettings::default();
        Self {
            user_agent: defaults.user_agent,
            referer: defaults.referer,
            cookie: defaults.cookie,
            proxy: defaults.proxy,
            timeout_secs: defaults.timeout.as_secs(),
            resolve_attempts: defaults.resolve_attempts,
            resolve_backoff_ms: defaults.resolve_backoff.as_millis() as u64,
            live_base_url: defaults.live_base_url,
            room_info_url: defaults.room_info_url,
            webcast_url: defaults.webcast_url,
            profile_url: defaults.profile_url,
        }
    }
}

impl Config {
    /// Load from a config file (extension optional), overridden by
    /// `LIVE_RECORDER__SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("LIVE_RECORDER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn recording_settings(&self) -> RecordingSettings {
        RecordingSettings {
            root: PathBuf::from(&self.recording.root),
            ffmpeg_path: PathBuf::from(&self.recording.ffmpeg_path),
            segment_duration: Duration::from_secs(self.recording.segment_secs.max(1)),
            container: self.recording.container.clone(),
            concat: self.recording.concat,
            stop_grace: Duration::from_secs(self.recording.stop_grace_secs),
            max_restarts: self.recording.max_restarts,
            retention: Duration::from_secs(self.recording.retention_secs),
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(self.monitor.poll_interval_secs),
            max_attempts: self.monitor.max_attempts.max(1),
            backoff: Duration::from_millis(self.monitor.backoff_ms),
        }
    }

    pub fn upstream_settings(&self) -> UpstreamSettings {
        UpstreamSettings {
            user_agent: self.upstream.user_agent.clone(),
            referer: self.upstream.referer.clone(),
            cookie: self.upstream.cookie.clone(),
            proxy: self.upstream.proxy.clone().filter(|p| !p.is_empty()),
            timeout: Duration::from_secs(self.upstream.timeout_secs),
            resolve_attempts: self.upstream.resolve_attempts.max(1),
            resolve_backoff: Duration::from_millis(self.upstream.resolve_backoff_ms),
            live_base_url: self.upstream.live_base_url.clone(),
            room_info_url: self.upstream.room_info_url.clone(),
            webcast_url: self.upstream.webcast_url.clone(),
            profile_url: self.upstream.profile_url.clone(),
        }
    }
}
