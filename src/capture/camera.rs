//! Camera stream acquisition using nokhwa
//!
//! A [`CameraStream`] owns a dedicated capture thread that decodes frames
//! to RGB and publishes the latest one over a watch channel. Cloneable
//! [`VideoTrack`] handles observe frames without owning the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use thiserror::Error;
use tokio::sync::watch;

use super::audio::{AudioTrack, MicrophoneCapture};
use super::types::{CameraInfo, FacingMode};

/// Preferred capture format, requested as "closest" from the device.
const IDEAL_WIDTH: u32 = 1920;
const IDEAL_HEIGHT: u32 = 1080;
const IDEAL_FPS: u32 = 30;

/// Acquisition errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// One decoded video frame, tightly packed RGB24.
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<u8>>,
}

/// Cloneable handle to a stream's video frames.
///
/// Tracks observe the latest frame; they never keep the device open by
/// themselves, so a recorder holding track clones cannot stop the camera.
#[derive(Clone)]
pub struct VideoTrack {
    rx: watch::Receiver<Option<Frame>>,
}

impl VideoTrack {
    pub(crate) fn new(rx: watch::Receiver<Option<Frame>>) -> Self {
        Self { rx }
    }

    /// The frame current at this instant, if the camera has produced one.
    pub fn latest(&self) -> Option<Frame> {
        self.rx.borrow().clone()
    }

    /// Wait until the track has produced a frame, up to `timeout`.
    pub async fn wait_for_frame(&self, timeout: std::time::Duration) -> Option<Frame> {
        let mut rx = self.rx.clone();
        tokio::time::timeout(timeout, async move {
            loop {
                if let Some(frame) = rx.borrow_and_update().clone() {
                    return Some(frame);
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        })
        .await
        .ok()
        .flatten()
    }
}

/// An open camera (plus optional microphone), acquired for one facing role.
///
/// The stream exclusively owns its capture threads; [`CameraStream::release`]
/// (or drop) stops every track.
pub struct CameraStream {
    facing: FacingMode,
    video: Option<VideoTrack>,
    audio: Option<AudioTrack>,
    stop: Arc<AtomicBool>,
    capture_thread: Option<JoinHandle<()>>,
    microphone: Option<MicrophoneCapture>,
}

impl CameraStream {
    /// Open the camera for `facing`, requesting video closest to 1920x1080.
    ///
    /// When `include_audio` is set the default microphone is opened as the
    /// stream's audio track; a missing microphone degrades to video-only.
    /// Blocks until the device is open (which may wait on a permission
    /// prompt), so call it off the async runtime.
    pub fn acquire(facing: FacingMode, include_audio: bool) -> CaptureResult<Self> {
        let index = device_for_facing(facing)?;

        let stop = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = watch::channel(None);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let thread_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            capture_loop(index, frame_tx, ready_tx, thread_stop);
        });

        // The camera is opened on the capture thread; wait for the verdict.
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(err);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::DeviceUnavailable(
                    "capture thread exited during startup".to_string(),
                ));
            }
        }

        let microphone = if include_audio {
            match MicrophoneCapture::open_default() {
                Ok(mic) => Some(mic),
                Err(err) => {
                    tracing::warn!("microphone unavailable, continuing without audio: {err}");
                    None
                }
            }
        } else {
            None
        };
        let audio = microphone.as_ref().map(MicrophoneCapture::track);

        tracing::info!(?facing, has_audio = audio.is_some(), "camera stream acquired");

        Ok(Self {
            facing,
            video: Some(VideoTrack::new(frame_rx)),
            audio,
            stop,
            capture_thread: Some(handle),
            microphone,
        })
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn video_track(&self) -> Option<VideoTrack> {
        self.video.clone()
    }

    pub fn audio_track(&self) -> Option<AudioTrack> {
        self.audio.clone()
    }

    pub fn is_active(&self) -> bool {
        self.capture_thread.is_some()
    }

    /// Stop every track on the stream. Safe to call more than once.
    pub fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                tracing::warn!("camera capture thread panicked");
            }
        }
        if let Some(mut mic) = self.microphone.take() {
            mic.stop();
        }
        self.video = None;
        self.audio = None;
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
impl CameraStream {
    /// Build a stream around externally fed tracks, for tests.
    pub(crate) fn synthetic(
        facing: FacingMode,
        video: Option<VideoTrack>,
        audio: Option<AudioTrack>,
    ) -> Self {
        Self {
            facing,
            video,
            audio,
            stop: Arc::new(AtomicBool::new(false)),
            capture_thread: None,
            microphone: None,
        }
    }
}

/// A watch-backed video track whose frames the test feeds by hand.
#[cfg(test)]
pub(crate) fn test_video_track() -> (watch::Sender<Option<Frame>>, VideoTrack) {
    let (tx, rx) = watch::channel(None);
    (tx, VideoTrack::new(rx))
}

#[cfg(test)]
pub(crate) fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for _ in 0..width * height {
        data.extend_from_slice(&rgb);
    }
    Frame {
        width,
        height,
        data: Arc::new(data),
    }
}

fn capture_loop(
    index: CameraIndex,
    frame_tx: watch::Sender<Option<Frame>>,
    ready_tx: std::sync::mpsc::Sender<CaptureResult<()>>,
    stop: Arc<AtomicBool>,
) {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(IDEAL_WIDTH, IDEAL_HEIGHT),
            FrameFormat::MJPEG,
            IDEAL_FPS,
        ),
    ));

    let mut camera = match Camera::new(index.clone(), requested) {
        Ok(camera) => camera,
        Err(err) => {
            let _ = ready_tx.send(Err(classify(err)));
            return;
        }
    };

    if let Err(err) = camera.open_stream() {
        let _ = ready_tx.send(Err(classify(err)));
        return;
    }

    let format = camera.camera_format();
    tracing::info!(
        "camera {:?} opened: {}x{} @ {}fps ({:?})",
        index,
        format.resolution().width(),
        format.resolution().height(),
        format.frame_rate(),
        format.format()
    );
    let _ = ready_tx.send(Ok(()));

    while !stop.load(Ordering::SeqCst) {
        // frame() blocks until the camera delivers; the device paces the loop
        match camera.frame() {
            Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                Ok(decoded) => {
                    let (width, height) = decoded.dimensions();
                    let frame = Frame {
                        width,
                        height,
                        data: Arc::new(decoded.into_raw()),
                    };
                    if frame_tx.send(Some(frame)).is_err() {
                        break;
                    }
                }
                Err(err) => tracing::debug!("frame decode failed: {err}"),
            },
            Err(err) => tracing::debug!("frame read failed: {err}"),
        }
    }

    if let Err(err) = camera.stop_stream() {
        tracing::warn!("error stopping camera stream: {err}");
    }
}

/// Get the list of available cameras.
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                let name = info.human_name().to_string();
                let facing_hint = facing_hint(&name);
                CameraInfo {
                    id,
                    name,
                    facing_hint,
                }
            })
            .collect(),
        Err(err) => {
            tracing::warn!("failed to enumerate cameras: {err}");
            Vec::new()
        }
    }
}

/// Pick a device index for a facing role: name hints first, then position.
/// Desktop cameras rarely advertise a facing, so Front falls back to the
/// first device and Back to the second (or the last one available).
fn device_for_facing(facing: FacingMode) -> CaptureResult<CameraIndex> {
    let cameras = nokhwa::query(ApiBackend::Auto).map_err(classify)?;
    if cameras.is_empty() {
        return Err(CaptureError::DeviceUnavailable(
            "no cameras found".to_string(),
        ));
    }

    if let Some(info) = cameras
        .iter()
        .find(|info| facing_hint(&info.human_name()) == Some(facing))
    {
        return Ok(info.index().clone());
    }

    let position = match facing {
        FacingMode::Front => 0,
        FacingMode::Back => 1,
    };
    let info = &cameras[position.min(cameras.len() - 1)];
    Ok(info.index().clone())
}

fn facing_hint(name: &str) -> Option<FacingMode> {
    let name = name.to_lowercase();
    if ["front", "user", "face"].iter().any(|k| name.contains(k)) {
        Some(FacingMode::Front)
    } else if ["back", "rear", "environment", "world"]
        .iter()
        .any(|k| name.contains(k))
    {
        Some(FacingMode::Back)
    } else {
        None
    }
}

fn classify(err: nokhwa::NokhwaError) -> CaptureError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureError::PermissionDenied(msg)
    } else {
        CaptureError::DeviceUnavailable(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_hint_reads_device_names() {
        assert_eq!(facing_hint("Front Camera"), Some(FacingMode::Front));
        assert_eq!(facing_hint("Rear camera module"), Some(FacingMode::Back));
        assert_eq!(facing_hint("Integrated Webcam"), None);
    }

    #[test]
    fn release_is_idempotent() {
        let (_tx, track) = test_video_track();
        let mut stream = CameraStream::synthetic(FacingMode::Front, Some(track), None);
        assert!(stream.video_track().is_some());
        stream.release();
        stream.release();
        assert!(stream.video_track().is_none());
        assert!(!stream.is_active());
    }

    #[tokio::test]
    async fn wait_for_frame_resolves_on_the_first_publish() {
        let (tx, track) = test_video_track();

        let waiter = tokio::spawn({
            let track = track.clone();
            async move { track.wait_for_frame(std::time::Duration::from_secs(1)).await }
        });
        tokio::task::yield_now().await;
        tx.send_replace(Some(solid_frame(2, 2, [1, 2, 3])));

        let frame = waiter.await.unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (2, 2));

        // An empty track times out instead of hanging
        let (_tx, empty) = test_video_track();
        assert!(empty
            .wait_for_frame(std::time::Duration::from_millis(10))
            .await
            .is_none());
    }

    #[test]
    fn video_track_sees_the_latest_frame() {
        let (tx, track) = test_video_track();
        assert!(track.latest().is_none());
        tx.send_replace(Some(solid_frame(4, 2, [10, 20, 30])));
        let frame = track.latest().unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        tx.send_replace(Some(solid_frame(8, 8, [0, 0, 0])));
        assert_eq!(track.latest().unwrap().width, 8);
    }
}
