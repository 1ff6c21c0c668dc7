//! Recording session state and encoding profiles

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current state of a recorder session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
    /// Session finished; construct a new session to record again
    Stopped,
}

/// Container/codec profile for a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingProfile {
    /// WebM with VP9 video and Opus audio (preferred)
    Vp9Opus,
    /// WebM with whatever default codecs the host encoder picks
    Webm,
}

impl EncodingProfile {
    /// Media type tag for artifacts produced under this profile.
    pub fn media_type(self) -> &'static str {
        match self {
            EncodingProfile::Vp9Opus => "video/webm;codecs=vp9,opus",
            EncodingProfile::Webm => "video/webm",
        }
    }
}

/// Recording errors
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("stream has no combinable video track")]
    NoCombinableTracks,

    #[error("no combined stream available")]
    NoStreamAvailable,

    #[error("no active recording session")]
    NoActiveSession,

    #[error("recording already in progress")]
    AlreadyRecording,

    #[error("encoder error: {0}")]
    Encoder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RecorderResult<T> = Result<T, RecorderError>;

/// A finished recording: the chunk payload concatenated in delivery
/// order, tagged with its container media type.
pub struct RecordedMedia {
    pub payload: Vec<u8>,
    pub media_type: &'static str,
}
