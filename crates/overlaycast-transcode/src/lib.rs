// ABOUTME: Transcoding runtime for overlaycast, turning source descriptors into running ffmpeg jobs.
// ABOUTME: Provides the stream session manager, its in-memory job registry, and the foreground generator.

pub mod generator;
pub mod manager;
pub mod registry;

pub use generator::run_generator;
pub use manager::{PlaylistAsset, StreamConfig, StreamError, StreamSession, StreamSessionManager};
pub use registry::{JobRegistry, JobSnapshot, JobStatus, TranscodeJob};
