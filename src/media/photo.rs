//! Still photo capture
//!
//! Rasterizes the frame a video track holds at invocation time into a
//! JPEG at the frame's native pixel dimensions.

use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

use super::JPEG_QUALITY;
use crate::capture::{Frame, VideoTrack};

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("no frame available for capture")]
    NoFrame,

    #[error("photo encoding failed: {0}")]
    Encode(String),
}

/// Capture the frame current at this instant as an encoded JPEG.
///
/// Never waits for a future frame: a track that has not produced one yet
/// fails with [`PhotoError::NoFrame`].
pub async fn capture_frame(track: &VideoTrack) -> Result<Vec<u8>, PhotoError> {
    let frame = track.latest().ok_or(PhotoError::NoFrame)?;
    tokio::task::spawn_blocking(move || encode_jpeg(&frame))
        .await
        .map_err(|err| PhotoError::Encode(err.to_string()))?
}

pub(crate) fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>, PhotoError> {
    let image = image::RgbImage::from_raw(frame.width, frame.height, frame.data.as_ref().clone())
        .ok_or_else(|| {
            PhotoError::Encode("frame buffer does not match its dimensions".to_string())
        })?;

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&image)
        .map_err(|err| PhotoError::Encode(err.to_string()))?;
    Ok(bytes)
}
