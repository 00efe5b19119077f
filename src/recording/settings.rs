use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How segments are joined into the final file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcatMode {
    /// ffmpeg concat demuxer with stream copy
    Ffmpeg,
    /// Byte-wise concatenation (valid for MPEG-TS segments)
    Binary,
}

/// Configuration for recording jobs
#[derive(Debug, Clone)]
pub struct RecordingSettings {
    /// Recording root; every job directory and output lives beneath it
    pub root: PathBuf,

    /// Stream-copy executable
    pub ffmpeg_path: PathBuf,

    /// Duration of each segment file
    /// Default: 10 seconds
    pub segment_duration: Duration,

    /// Extension of the merged output
    pub container: String,

    pub concat: ConcatMode,

    /// How long a capture process gets to exit after being asked to stop
    pub stop_grace: Duration,

    /// Relaunches allowed when the capture exits while the room is still live
    pub max_restarts: u32,

    /// How long terminal jobs stay queryable in memory
    /// Default: 1 hour
    pub retention: Duration,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data/livestreams"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            segment_duration: Duration::from_secs(10),
            container: "ts".to_string(),
            concat: ConcatMode::Ffmpeg,
            stop_grace: Duration::from_secs(10),
            max_restarts: 3,
            retention: Duration::from_secs(3600),
        }
    }
}

/// Configuration for the room status monitor
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Time between status polls
    /// Default: 30 seconds
    pub poll_interval: Duration,

    /// Consecutive failed attempts before a poll counts as "stream ended"
    pub max_attempts: u32,

    /// Base wait between failed attempts (multiplied by the attempt number)
    pub backoff: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}
