//! Live capture through `cpal`.
//!
//! The device callback downmixes to mono, converts to int16 and cuts the
//! stream into exact frames, which cross to the reader over a bounded
//! channel. A full channel drops the frame and counts it.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use cpal::{
    SampleFormat, SampleRate, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::{info, warn};

use super::{AudioSource, pcm::f32_to_i16};
use crate::{Result, WakeprintError, config::AudioConfig};

/// Frames buffered between the device callback and the reader.
const CHANNEL_FRAMES: usize = 64;

/// Names of all input devices on the default host.
pub fn input_device_names() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| WakeprintError::Device(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Microphone input. The `cpal` stream is not `Send`; open it on the
/// thread that reads from it.
pub struct MicrophoneSource {
    _stream: Stream,
    rx: Receiver<Vec<i16>>,
    dropped: Arc<AtomicU64>,
}

impl MicrophoneSource {
    /// Open `device` (or the default input) at the configured rate.
    pub fn open(device: Option<&str>, audio: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device {
            Some(name) => host
                .input_devices()
                .map_err(|e| WakeprintError::Device(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| WakeprintError::Device(format!("input device '{name}' not found")))?,
            None => host
                .default_input_device()
                .ok_or_else(|| WakeprintError::Device("no default input device".into()))?,
        };

        let rate = SampleRate(audio.sample_rate);
        let supported = device
            .supported_input_configs()
            .map_err(|e| WakeprintError::Device(e.to_string()))?
            .filter(|c| c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
            .filter(|c| matches!(c.sample_format(), SampleFormat::F32 | SampleFormat::I16))
            .min_by_key(|c| c.channels())
            .ok_or_else(|| {
                WakeprintError::Device(format!(
                    "device offers no i16/f32 input at {} Hz",
                    audio.sample_rate
                ))
            })?
            .with_sample_rate(rate);

        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels as usize;
        info!(
            "capturing from '{}' ({channels} ch, {:?}, {} Hz)",
            device.name().unwrap_or_else(|_| "unknown".into()),
            format,
            audio.sample_rate
        );

        let (tx, rx) = bounded(CHANNEL_FRAMES);
        let dropped = Arc::new(AtomicU64::new(0));
        let mut framer = Framer::new(audio.frame_size, channels, tx, dropped.clone());
        let err_fn = |e: cpal::StreamError| warn!("audio stream error: {e}");

        let stream = match format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| framer.push(data, |s| s),
                err_fn,
                None,
            ),
            _ => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| framer.push(data, f32_to_i16),
                err_fn,
                None,
            ),
        }
        .map_err(|e| WakeprintError::Device(e.to_string()))?;
        stream
            .play()
            .map_err(|e| WakeprintError::Device(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            rx,
            dropped,
        })
    }

    /// Frames lost because the reader fell behind.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AudioSource for MicrophoneSource {
    fn read_frame(&mut self) -> Result<Option<Vec<i16>>> {
        // the sender lives in the stream callback; disconnection means the
        // stream is gone
        Ok(self.rx.recv().ok())
    }
}

/// Interleaved device samples → mono frames of exactly `frame_size`.
struct Framer {
    frame_size: usize,
    channels: usize,
    buf: Vec<i16>,
    tx: Sender<Vec<i16>>,
    dropped: Arc<AtomicU64>,
}

impl Framer {
    fn new(frame_size: usize, channels: usize, tx: Sender<Vec<i16>>, dropped: Arc<AtomicU64>) -> Self {
        Self {
            frame_size,
            channels: channels.max(1),
            buf: Vec::with_capacity(frame_size),
            tx,
            dropped,
        }
    }

    fn push<T: Copy>(&mut self, data: &[T], to_i16: impl Fn(T) -> i16) {
        for chunk in data.chunks(self.channels) {
            let sum: i32 = chunk.iter().map(|&s| to_i16(s) as i32).sum();
            self.buf.push((sum / chunk.len() as i32) as i16);
            if self.buf.len() == self.frame_size {
                let frame = std::mem::replace(&mut self.buf, Vec::with_capacity(self.frame_size));
                if self.tx.try_send(frame).is_err() {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}
