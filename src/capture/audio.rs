//! Microphone capture using cpal
//!
//! The cpal stream is not `Send`, so [`MicrophoneCapture`] parks it on a
//! dedicated thread and fans captured samples out to [`AudioTrack`]
//! subscribers as interleaved s16 batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::broadcast;

use super::types::AudioDeviceInfo;

/// Sample batches buffered per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio input device available")]
    NoInputDevice,

    #[error("audio device error: {0}")]
    Device(String),
}

/// Cloneable handle to a stream's audio samples.
///
/// Like [`super::camera::VideoTrack`], the handle does not own the device;
/// dropping every clone does not stop the microphone.
#[derive(Clone)]
pub struct AudioTrack {
    tx: broadcast::Sender<Arc<Vec<i16>>>,
    sample_rate: u32,
    channels: u16,
}

impl AudioTrack {
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Vec<i16>>> {
        self.tx.subscribe()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

#[cfg(test)]
pub(crate) fn test_audio_track(sample_rate: u32, channels: u16) -> AudioTrack {
    let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
    AudioTrack {
        tx,
        sample_rate,
        channels,
    }
}

/// An open microphone. Owns the capture thread; stopping (or dropping)
/// closes the device.
pub struct MicrophoneCapture {
    track: AudioTrack,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneCapture {
    /// Open the default input device.
    pub fn open_default() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;
        Self::open(device)
    }

    fn open(device: cpal::Device) -> Result<Self, AudioError> {
        let supported = device
            .default_input_config()
            .map_err(|err| AudioError::Device(err.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();

        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let track = AudioTrack {
            tx: tx.clone(),
            sample_rate,
            channels,
        };

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let thread = std::thread::spawn(move || {
            let config: cpal::StreamConfig = supported.config();
            let err_fn = |err| tracing::warn!("audio input error: {err}");

            let built = match supported.sample_format() {
                cpal::SampleFormat::I16 => {
                    let tx = tx.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            let _ = tx.send(Arc::new(data.to_vec()));
                        },
                        err_fn,
                        None,
                    )
                }
                cpal::SampleFormat::U16 => {
                    let tx = tx.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[u16], _: &cpal::InputCallbackInfo| {
                            let samples: Vec<i16> =
                                data.iter().map(|s| (*s as i32 - 32768) as i16).collect();
                            let _ = tx.send(Arc::new(samples));
                        },
                        err_fn,
                        None,
                    )
                }
                cpal::SampleFormat::F32 => {
                    let tx = tx.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            let samples: Vec<i16> = data
                                .iter()
                                .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                                .collect();
                            let _ = tx.send(Arc::new(samples));
                        },
                        err_fn,
                        None,
                    )
                }
                other => {
                    let _ = ready_tx.send(Err(AudioError::Device(format!(
                        "unsupported sample format {other:?}"
                    ))));
                    return;
                }
            };

            let stream = match built {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(AudioError::Device(err.to_string())));
                    return;
                }
            };
            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Device(err.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            while !thread_stop.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!(sample_rate, channels, "microphone capture started");
                Ok(Self {
                    track,
                    stop,
                    thread: Some(thread),
                })
            }
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::Device(
                    "audio thread exited during startup".to_string(),
                ))
            }
        }
    }

    /// Handle for subscribers; shares the capture without owning it.
    pub fn track(&self) -> AudioTrack {
        self.track.clone()
    }

    /// Stop capturing. Safe to call more than once.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Get the list of available audio input devices.
pub fn list_audio_inputs() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|device| device.name().ok())
            .map(|name| AudioDeviceInfo {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            })
            .collect(),
        Err(err) => {
            tracing::warn!("failed to enumerate audio inputs: {err}");
            Vec::new()
        }
    }
}
