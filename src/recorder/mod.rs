//! Dual-stream recording
//!
//! This module implements the recording pipeline:
//! - CombinedStream: non-owning view over both cameras' tracks
//! - DualRecorder: the idle → recording ⇄ paused → stopped session
//! - MediaEncoder: the host encoder seam (ffmpeg in production)

pub mod dual;
pub mod encoder;
pub mod state;

pub use dual::{CombinedStream, DualRecorder};
pub use encoder::{FfmpegEncoder, MediaEncoder};
pub use state::{EncodingProfile, RecordedMedia, RecorderError, RecorderResult, RecorderState};
