//! Error types and handling
//!
//! Application-wide aggregation of the subsystem errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::{AudioError, CaptureError};
use crate::media::{ComposeError, PhotoError};
use crate::recorder::RecorderError;
use crate::registry::StorageError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("photo capture failed: {0}")]
    Photo(#[from] PhotoError),

    #[error("photo composition failed: {0}")]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("camera streams are not ready")]
    CamerasNotReady,

    #[error("unknown media item: {0}")]
    UnknownMedia(uuid::Uuid),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Error presentation for the embedding shell's error overlay
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Capture(CaptureError::PermissionDenied(_)) => "PERMISSION_DENIED",
            AppError::Capture(CaptureError::DeviceUnavailable(_)) => "DEVICE_UNAVAILABLE",
            AppError::Audio(_) => "DEVICE_UNAVAILABLE",
            AppError::Photo(_) => "CAPTURE_FAILED",
            AppError::Compose(_) => "COMPOSITION_FAILED",
            AppError::Recorder(RecorderError::NoCombinableTracks) => "NO_COMBINABLE_TRACKS",
            AppError::Recorder(RecorderError::NoStreamAvailable) => "NO_STREAM_AVAILABLE",
            AppError::Recorder(RecorderError::NoActiveSession) => "NO_ACTIVE_SESSION",
            AppError::Recorder(_) => "RECORDING_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::CamerasNotReady => "CAMERAS_NOT_READY",
            AppError::UnknownMedia(_) => "UNKNOWN_MEDIA",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_the_capture_taxonomy() {
        let response: ErrorResponse =
            AppError::Capture(CaptureError::PermissionDenied("camera".into())).into();
        assert_eq!(response.code, "PERMISSION_DENIED");

        let response: ErrorResponse = AppError::Recorder(RecorderError::NoActiveSession).into();
        assert_eq!(response.code, "NO_ACTIVE_SESSION");
    }
}
