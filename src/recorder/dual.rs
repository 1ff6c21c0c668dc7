//! Dual stream recording session
//!
//! Combines the video tracks of two camera streams (plus the first
//! stream's audio) and drives the
//! `idle → recording ⇄ paused → stopped` lifecycle, buffering encoded
//! chunks until stop concatenates them into the final payload.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::encoder::{FfmpegEncoder, MediaEncoder};
use super::state::{EncodingProfile, RecordedMedia, RecorderError, RecorderResult, RecorderState};
use crate::capture::{AudioTrack, CameraStream, VideoTrack};

/// Non-owning aggregate of the tracks being recorded.
///
/// Holds clones of track handles only: dropping it (or stopping the
/// recording) never stops the source cameras, and releasing a camera is
/// never routed through here.
#[derive(Clone)]
pub struct CombinedStream {
    pub(crate) video_a: VideoTrack,
    pub(crate) video_b: VideoTrack,
    pub(crate) audio: Option<AudioTrack>,
}

impl CombinedStream {
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// One recording session over two camera streams.
///
/// A session is single-use: after [`DualRecorder::stop`] it stays in the
/// terminal `Stopped` state and a new recorder must be constructed.
pub struct DualRecorder {
    combined: Option<CombinedStream>,
    encoder: Box<dyn MediaEncoder>,
    state: RecorderState,
    profile: Option<EncodingProfile>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    collector: Option<tokio::task::JoinHandle<()>>,
    recorded: Duration,
    recording_since: Option<Instant>,
}

impl DualRecorder {
    /// Build a session over two acquired streams with the default
    /// ffmpeg backend.
    ///
    /// The audio track is taken from `stream_a` only; a microphone on
    /// `stream_b` is ignored to avoid doubled audio.
    pub fn new(stream_a: &CameraStream, stream_b: &CameraStream) -> RecorderResult<Self> {
        Self::with_encoder(stream_a, stream_b, Box::new(FfmpegEncoder::new()))
    }

    /// Same as [`DualRecorder::new`] with an explicit encoder backend.
    pub fn with_encoder(
        stream_a: &CameraStream,
        stream_b: &CameraStream,
        encoder: Box<dyn MediaEncoder>,
    ) -> RecorderResult<Self> {
        let video_a = stream_a
            .video_track()
            .ok_or(RecorderError::NoCombinableTracks)?;
        let video_b = stream_b
            .video_track()
            .ok_or(RecorderError::NoCombinableTracks)?;
        let audio = stream_a.audio_track();

        Ok(Self {
            combined: Some(CombinedStream {
                video_a,
                video_b,
                audio,
            }),
            encoder,
            state: RecorderState::Idle,
            profile: None,
            chunks: Arc::new(Mutex::new(Vec::new())),
            collector: None,
            recorded: Duration::ZERO,
            recording_since: None,
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Number of chunks delivered and buffered so far.
    pub fn buffered_chunks(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Recorded time so far; paused spans do not count.
    pub fn duration(&self) -> Duration {
        let live = self
            .recording_since
            .map(|since| since.elapsed())
            .unwrap_or(Duration::ZERO);
        self.recorded + live
    }

    /// Begin encoding. Valid only from `Idle`.
    ///
    /// Prefers the VP9+Opus profile and silently degrades to the plain
    /// WebM container when the host encoder cannot do better.
    pub async fn start(&mut self) -> RecorderResult<()> {
        if matches!(
            self.state,
            RecorderState::Recording | RecorderState::Paused
        ) {
            return Err(RecorderError::AlreadyRecording);
        }
        let combined = self
            .combined
            .clone()
            .ok_or(RecorderError::NoStreamAvailable)?;

        self.chunks.lock().clear();

        let profile = if self.encoder.supports(EncodingProfile::Vp9Opus) {
            EncodingProfile::Vp9Opus
        } else {
            tracing::debug!("vp9/opus unsupported by host encoder, using container default");
            EncodingProfile::Webm
        };

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(32);
        let buffer = self.chunks.clone();
        // The delivery task is the only writer of the chunk buffer.
        // Zero-size chunks are dropped on arrival, never appended.
        let collector = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                buffer.lock().push(chunk);
            }
        });

        if let Err(err) = self.encoder.begin(combined, profile, tx).await {
            collector.abort();
            return Err(err);
        }

        self.profile = Some(profile);
        self.collector = Some(collector);
        self.recorded = Duration::ZERO;
        self.recording_since = Some(Instant::now());
        self.state = RecorderState::Recording;
        tracing::info!(?profile, "recording started");
        Ok(())
    }

    /// Suspend a live recording; a no-op in any other state.
    pub async fn pause(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        self.encoder.pause().await;
        if let Some(since) = self.recording_since.take() {
            self.recorded += since.elapsed();
        }
        self.state = RecorderState::Paused;
        tracing::info!("recording paused");
    }

    /// Continue a paused recording; a no-op in any other state.
    pub async fn resume(&mut self) {
        if self.state != RecorderState::Paused {
            return;
        }
        self.encoder.resume().await;
        self.recording_since = Some(Instant::now());
        self.state = RecorderState::Recording;
        tracing::info!("recording resumed");
    }

    /// Finish the session and return the recorded media.
    ///
    /// Waits for the final chunk flush, then concatenates the buffer in
    /// delivery order. The session is `Stopped` afterwards.
    pub async fn stop(&mut self) -> RecorderResult<RecordedMedia> {
        if !matches!(
            self.state,
            RecorderState::Recording | RecorderState::Paused
        ) {
            return Err(RecorderError::NoActiveSession);
        }

        if let Some(since) = self.recording_since.take() {
            self.recorded += since.elapsed();
        }

        match self.encoder.finish().await {
            Ok(()) => {
                if let Some(collector) = self.collector.take() {
                    let _ = collector.await;
                }
            }
            Err(err) => {
                self.encoder.abort().await;
                if let Some(collector) = self.collector.take() {
                    collector.abort();
                }
                self.combined = None;
                self.state = RecorderState::Stopped;
                return Err(err);
            }
        }

        let chunks = std::mem::take(&mut *self.chunks.lock());
        let payload = chunks.concat();
        let media_type = self
            .profile
            .take()
            .map(EncodingProfile::media_type)
            .unwrap_or("video/webm");

        self.combined = None;
        self.state = RecorderState::Stopped;
        tracing::info!(bytes = payload.len(), media_type, "recording stopped");

        Ok(RecordedMedia {
            payload,
            media_type,
        })
    }

    /// Force-stop any in-progress encode and discard buffered chunks.
    ///
    /// Callable from any state, repeatedly; never fails.
    pub async fn cleanup(&mut self) {
        if matches!(
            self.state,
            RecorderState::Recording | RecorderState::Paused
        ) {
            self.encoder.abort().await;
        }
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
        self.chunks.lock().clear();
        self.profile = None;
        self.combined = None;
        if let Some(since) = self.recording_since.take() {
            self.recorded += since.elapsed();
        }
        self.state = RecorderState::Stopped;
    }
}
