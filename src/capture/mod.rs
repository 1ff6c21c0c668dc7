//! Device acquisition
//!
//! Cameras are opened through nokhwa and microphones through cpal; each
//! open device is owned by exactly one stream, with cloneable track
//! handles for everyone else.

pub mod audio;
pub mod camera;
pub mod types;

// Re-export the acquisition surface
pub use audio::{list_audio_inputs, AudioError, AudioTrack, MicrophoneCapture};
pub use camera::{list_cameras, CameraStream, CaptureError, CaptureResult, Frame, VideoTrack};
pub use types::{AudioDeviceInfo, CameraInfo, FacingMode};
