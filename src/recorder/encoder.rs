//! Encoder backends
//!
//! [`MediaEncoder`] is the seam between the recorder state machine and
//! the host encoder. The production backend drives an ffmpeg child
//! process: composed side-by-side frames go in over stdin, microphone
//! samples over a fifo, and the muxed WebM stream comes back out of
//! stdout in periodic chunks.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::dual::CombinedStream;
use super::state::{EncodingProfile, RecorderError, RecorderResult};
use crate::capture::{AudioTrack, Frame};

/// Cadence at which encoded chunks are delivered to the recorder.
pub(crate) const CHUNK_INTERVAL: Duration = Duration::from_millis(100);

/// Frame rate of the composed recording.
const OUTPUT_FPS: u32 = 30;

/// How long begin() waits for each camera's first frame before giving up.
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// The host encoder seam.
///
/// Implementations encode the combined stream and deliver encoded chunks
/// over the provided channel; dropping the sender marks the end of the
/// chunk stream.
#[async_trait]
pub trait MediaEncoder: Send {
    /// Whether this backend can encode the given profile.
    fn supports(&self, profile: EncodingProfile) -> bool;

    /// Start encoding, delivering chunks roughly every 100ms.
    async fn begin(
        &mut self,
        stream: CombinedStream,
        profile: EncodingProfile,
        chunks: mpsc::Sender<Vec<u8>>,
    ) -> RecorderResult<()>;

    /// Suspend encoding; the recorded timeline stops advancing.
    async fn pause(&mut self);

    /// Continue a suspended encode.
    async fn resume(&mut self);

    /// Finish encoding, flush the final chunks, and end the chunk stream.
    async fn finish(&mut self) -> RecorderResult<()>;

    /// Tear the session down without caring about output. Must not fail.
    async fn abort(&mut self);
}

/// ffmpeg-backed encoder.
pub struct FfmpegEncoder {
    child: Arc<Mutex<Option<Child>>>,
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
    audio_writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    fifo: Option<(tempfile::TempDir, PathBuf)>,
    vp9_opus: OnceLock<bool>,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            child: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            writer: None,
            audio_writer: None,
            reader: None,
            fifo: None,
            vp9_opus: OnceLock::new(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    fn supports(&self, profile: EncodingProfile) -> bool {
        match profile {
            EncodingProfile::Webm => true,
            EncodingProfile::Vp9Opus => *self.vp9_opus.get_or_init(probe_vp9_opus),
        }
    }

    async fn begin(
        &mut self,
        stream: CombinedStream,
        profile: EncodingProfile,
        chunks: mpsc::Sender<Vec<u8>>,
    ) -> RecorderResult<()> {
        // The canvas geometry is fixed from the first frame of each track.
        let left = stream
            .video_a
            .wait_for_frame(FIRST_FRAME_TIMEOUT)
            .await
            .ok_or_else(|| RecorderError::Encoder("first camera produced no frames".to_string()))?;
        let right = stream
            .video_b
            .wait_for_frame(FIRST_FRAME_TIMEOUT)
            .await
            .ok_or_else(|| {
                RecorderError::Encoder("second camera produced no frames".to_string())
            })?;
        let seam = left.width;
        let width = left.width + right.width;
        let height = left.height.max(right.height);

        let audio = match stream.audio.clone() {
            Some(track) if cfg!(unix) => Some(track),
            Some(_) => {
                tracing::warn!("combined audio requires a unix host, recording without audio");
                None
            }
            None => None,
        };

        let audio_input = match &audio {
            Some(track) => {
                let dir = tempfile::tempdir()?;
                let path = dir.path().join("audio.pcm");
                make_fifo(&path)?;
                let input = (path.clone(), track.sample_rate(), track.channels());
                self.fifo = Some((dir, path));
                Some(input)
            }
            None => None,
        };

        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pixel_format",
            "rgb24",
            "-video_size",
            &format!("{width}x{height}"),
            "-framerate",
            &OUTPUT_FPS.to_string(),
            "-i",
            "-",
        ]);
        if let Some((path, rate, channels)) = &audio_input {
            cmd.args([
                "-f",
                "s16le",
                "-ar",
                &rate.to_string(),
                "-ac",
                &channels.to_string(),
                "-i",
            ]);
            cmd.arg(path);
        }
        match profile {
            EncodingProfile::Vp9Opus => {
                cmd.args([
                    "-c:v",
                    "libvpx-vp9",
                    "-deadline",
                    "realtime",
                    "-cpu-used",
                    "8",
                    "-b:v",
                    "2M",
                ]);
                if audio_input.is_some() {
                    cmd.args(["-c:a", "libopus"]);
                }
            }
            EncodingProfile::Webm => {
                cmd.args([
                    "-c:v",
                    "libvpx",
                    "-deadline",
                    "realtime",
                    "-cpu-used",
                    "8",
                    "-b:v",
                    "2M",
                ]);
                if audio_input.is_some() {
                    cmd.args(["-c:a", "libvorbis"]);
                }
            }
        }
        cmd.args(["-f", "webm", "-"]);

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    RecorderError::Encoder("ffmpeg not found on this host".to_string())
                } else {
                    RecorderError::Io(err)
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecorderError::Encoder("failed to open encoder input".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecorderError::Encoder("failed to open encoder output".to_string()))?;
        *self.child.lock() = Some(child);

        self.running.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        tracing::info!(
            width,
            height,
            fps = OUTPUT_FPS,
            has_audio = audio_input.is_some(),
            "encoder started"
        );

        // Video writer: the latest frame of each track, side by side
        let running = self.running.clone();
        let paused = self.paused.clone();
        let video_a = stream.video_a.clone();
        let video_b = stream.video_b.clone();
        self.writer = Some(std::thread::spawn(move || {
            let frame_interval = Duration::from_secs(1) / OUTPUT_FPS;
            let mut canvas = vec![0u8; (width * height * 3) as usize];
            while running.load(Ordering::SeqCst) {
                let tick = Instant::now();
                if !paused.load(Ordering::SeqCst) {
                    if let (Some(a), Some(b)) = (video_a.latest(), video_b.latest()) {
                        canvas.fill(0);
                        blit(&mut canvas, width, height, &a, 0);
                        blit(&mut canvas, width, height, &b, seam);
                        if stdin.write_all(&canvas).is_err() {
                            break;
                        }
                    }
                }
                if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
            // dropping stdin signals end of the video input
        }));

        if let (Some(track), Some((path, _, _))) = (audio, &audio_input) {
            let running = self.running.clone();
            let paused = self.paused.clone();
            let path = path.clone();
            self.audio_writer = Some(std::thread::spawn(move || {
                audio_loop(track, path, running, paused);
            }));
        }

        self.reader = Some(std::thread::spawn(move || {
            read_chunks(stdout, chunks);
        }));

        Ok(())
    }

    async fn pause(&mut self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    async fn resume(&mut self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    async fn finish(&mut self) -> RecorderResult<()> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        if let Some((_, path)) = &self.fifo {
            unblock_audio_open(path);
        }
        if let Some(audio) = self.audio_writer.take() {
            let _ = audio.join();
        }

        // Both inputs have hit EOF; wait for the final container flush.
        let exited = self.child.lock().take();
        if let Some(mut child) = exited {
            match child.wait() {
                Ok(status) if !status.success() => {
                    tracing::warn!("encoder exited with {status}");
                }
                Err(err) => tracing::warn!("failed to reap encoder: {err}"),
                _ => {}
            }
        }

        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        self.fifo = None;
        Ok(())
    }

    async fn abort(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some((_, path)) = &self.fifo {
            unblock_audio_open(path);
        }
        for handle in [
            self.writer.take(),
            self.audio_writer.take(),
            self.reader.take(),
        ]
        .into_iter()
        .flatten()
        {
            let _ = handle.join();
        }
        self.fifo = None;
    }
}

fn probe_vp9_opus() -> bool {
    let output = match Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => return false,
    };
    let listing = String::from_utf8_lossy(&output.stdout);
    listing.contains("libvpx-vp9") && listing.contains("libopus")
}

/// Copy one frame into the canvas at a horizontal offset, clipping to the
/// canvas bounds when a device renegotiates its frame size mid-session.
fn blit(canvas: &mut [u8], canvas_w: u32, canvas_h: u32, frame: &Frame, x_offset: u32) {
    let rows = frame.height.min(canvas_h);
    let cols = frame.width.min(canvas_w.saturating_sub(x_offset));
    for y in 0..rows {
        let src = (y * frame.width * 3) as usize;
        let dst = ((y * canvas_w + x_offset) * 3) as usize;
        let len = (cols * 3) as usize;
        canvas[dst..dst + len].copy_from_slice(&frame.data[src..src + len]);
    }
}

fn audio_loop(track: AudioTrack, path: PathBuf, running: Arc<AtomicBool>, paused: Arc<AtomicBool>) {
    use tokio::sync::broadcast::error::TryRecvError;

    let mut rx = track.subscribe();
    // Blocks until the encoder opens the read end.
    let mut fifo = match std::fs::OpenOptions::new().write(true).open(&path) {
        Ok(fifo) => fifo,
        Err(err) => {
            tracing::warn!("failed to open audio pipe: {err}");
            return;
        }
    };

    while running.load(Ordering::SeqCst) {
        match rx.try_recv() {
            Ok(batch) => {
                if paused.load(Ordering::SeqCst) {
                    continue;
                }
                let mut bytes = Vec::with_capacity(batch.len() * 2);
                for sample in batch.iter() {
                    bytes.extend_from_slice(&sample.to_le_bytes());
                }
                if fifo.write_all(&bytes).is_err() {
                    break;
                }
            }
            Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(5)),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!("audio fell behind by {skipped} batches");
            }
            Err(TryRecvError::Closed) => break,
        }
    }
    // dropping the fifo signals end of the audio input
}

fn read_chunks(mut stdout: ChildStdout, chunks: mpsc::Sender<Vec<u8>>) {
    let mut pending = Vec::new();
    let mut last_flush = Instant::now();
    let mut buf = [0u8; 8192];
    loop {
        match stdout.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                if last_flush.elapsed() >= CHUNK_INTERVAL {
                    if chunks.blocking_send(std::mem::take(&mut pending)).is_err() {
                        return;
                    }
                    last_flush = Instant::now();
                }
            }
            Err(err) => {
                tracing::debug!("encoder output read failed: {err}");
                break;
            }
        }
    }
    if !pending.is_empty() {
        let _ = chunks.blocking_send(pending);
    }
    // dropping the sender ends the chunk stream
}

#[cfg(unix)]
fn make_fifo(path: &Path) -> std::io::Result<()> {
    use std::os::unix::ffi::OsStrExt;

    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad fifo path"))?;
    let rc = unsafe { libc::mkfifo(cpath.as_ptr(), 0o600) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn make_fifo(_path: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "audio pipe requires a unix host",
    ))
}

/// Releases an audio thread still blocked opening the fifo's write end.
fn unblock_audio_open(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        let _ = std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path);
    }
    #[cfg(not(unix))]
    let _ = path;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::camera::solid_frame;

    #[test]
    fn blit_clips_to_canvas_bounds() {
        let mut canvas = vec![0u8; 4 * 2 * 3];
        let frame = solid_frame(3, 3, [7, 8, 9]);

        // Wider than the space right of the offset, taller than the canvas
        blit(&mut canvas, 4, 2, &frame, 2);

        // Row 0: columns 2..4 painted, 0..2 untouched
        assert_eq!(&canvas[0..6], &[0, 0, 0, 0, 0, 0]);
        assert_eq!(&canvas[6..12], &[7, 8, 9, 7, 8, 9]);
        // Row 1 painted as well, and nothing out of bounds panicked
        assert_eq!(&canvas[18..24], &[7, 8, 9, 7, 8, 9]);
    }

    #[test]
    fn blit_offset_past_canvas_is_a_noop() {
        let mut canvas = vec![0u8; 4 * 2 * 3];
        let frame = solid_frame(2, 2, [1, 2, 3]);
        blit(&mut canvas, 4, 2, &frame, 4);
        assert!(canvas.iter().all(|b| *b == 0));
    }
}
