//! Recording pipeline: capture, monitoring, merging and job supervision
//!
//! A job captures a live stream into fixed-duration segment files while the
//! monitor polls the room. When the room stops being live (or the job is
//! cancelled) the capture is stopped, awaited, and the segments are merged
//! into a single output file.

mod job;
mod manager;
mod merger;
mod monitor;
mod recorder;
mod segment;
mod settings;

pub use job::{JobState, JobStatus, RecordingJob};
pub use manager::{JobManager, StartedJob};
pub use merger::{MergeReport, SegmentMerger};
pub use monitor::{MonitorVerdict, RoomStatusMonitor};
pub use recorder::{
    CaptureBackend, CaptureExit, CaptureProcess, CaptureRequest, FfmpegBackend, SegmentRecorder,
};
pub use segment::{
    next_index, parse_segment_index, scan_segments, segment_file_name, segment_path,
    segment_pattern, Segment,
};
pub use settings::{ConcatMode, MonitorSettings, RecordingSettings};
