pub mod config;
pub mod error;
pub mod http;
pub mod recording;
pub mod resolve;
pub mod service;
pub mod upstream;

pub use config::Config;
pub use error::{ErrorKind, JobFailure, LiveError};
pub use http::{create_router, AppState};
pub use recording::{
    CaptureBackend, CaptureProcess, ConcatMode, FfmpegBackend, JobManager, JobState, JobStatus,
    MonitorSettings, RecordingSettings, SegmentMerger,
};
pub use resolve::{
    select_variant, IdentifierResolver, ResolutionMethod, RoomInfo, RoomInfoProvider, RoomStatus,
};
pub use service::LiveService;
pub use upstream::{HttpPlatform, LivePlatform, UpstreamError, UpstreamSettings};
