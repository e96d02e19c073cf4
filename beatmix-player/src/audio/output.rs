//! Audio output using cpal
//!
//! The playback consumer writes interleaved frames through the blocking
//! [`OutputDevice`] interface. [`CpalOutput`] bridges that to cpal's
//! callback model with a ring buffer: `write` pushes into the ring and waits
//! while it is full, the audio callback drains it and plays silence on
//! underflow.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Blocking sink for interleaved f32 frames
pub trait OutputDevice {
    /// Write interleaved samples, blocking until the device has room.
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Stop output and release the device.
    fn close(&mut self) -> Result<()>;
}

/// Opens output devices
///
/// Devices are opened on the playback thread itself because audio streams
/// generally cannot be moved between threads.
pub trait DeviceOpener: Send + Sync {
    fn open(&self, channels: u16, sample_rate: u32) -> Result<Box<dyn OutputDevice>>;
}

/// Opens cpal output streams
#[derive(Debug, Clone)]
pub struct CpalOpener {
    /// Device name (None = default device)
    pub device_name: Option<String>,
    /// Ring buffer length in frames
    pub ring_frames: usize,
}

impl CpalOpener {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            ring_frames: 8192,
        }
    }

    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Requested device, falling back to the default one.
    fn find_device(&self) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = self.device_name.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(dev) = devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(dev);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let dev = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            dev.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(dev)
    }

    /// Prefer the requested channel count and rate in f32, else the device default.
    fn best_config(device: &Device, channels: u16, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported_configs = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported_configs.find(|config| {
            config.channels() == channels
                && config.min_sample_rate().0 <= sample_rate
                && config.max_sample_rate().0 >= sample_rate
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(supported_config) = preferred {
            let sample_format = supported_config.sample_format();
            let config = supported_config
                .with_sample_rate(cpal::SampleRate(sample_rate))
                .config();
            return Ok((config, sample_format));
        }

        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        if supported_config.sample_rate().0 != sample_rate {
            warn!(
                "Device does not support {}Hz, playing at {}Hz",
                sample_rate,
                supported_config.sample_rate().0
            );
        }

        let sample_format = supported_config.sample_format();
        Ok((supported_config.config(), sample_format))
    }
}

impl DeviceOpener for CpalOpener {
    fn open(&self, channels: u16, sample_rate: u32) -> Result<Box<dyn OutputDevice>> {
        let device = self.find_device()?;
        let (config, sample_format) = Self::best_config(&device, channels, sample_rate)?;

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let rb = HeapRb::<f32>::new(self.ring_frames.max(1) * channels as usize);
        let (producer, consumer) = rb.split();

        let error_flag = Arc::new(AtomicBool::new(false));
        let underflows = Arc::new(AtomicU64::new(0));
        let feed = RingFeed {
            consumer,
            source_channels: channels as usize,
            device_channels: config.channels as usize,
            scratch: Vec::new(),
            underflows: Arc::clone(&underflows),
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, feed, &error_flag, |s| s)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, feed, &error_flag, |s| {
                (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            })?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, feed, &error_flag, |s| {
                ((s.clamp(-1.0, 1.0) + 1.0) * 32767.5) as u16
            })?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        info!("Audio stream started");

        Ok(Box::new(CpalOutput {
            stream: Some(stream),
            writer: RingWriter::new(producer, channels as usize, error_flag),
            underflows,
        }))
    }
}

/// Callback side of the ring: converts interleaved source frames to the
/// device channel layout.
struct RingFeed {
    consumer: HeapCons<f32>,
    source_channels: usize,
    device_channels: usize,
    scratch: Vec<f32>,
    underflows: Arc<AtomicU64>,
}

impl RingFeed {
    fn fill<T: Copy>(&mut self, data: &mut [T], silence: T, convert: impl Fn(f32) -> T) {
        let frames = data.len() / self.device_channels.max(1);
        self.scratch.resize(frames * self.source_channels, 0.0);
        let read = self.consumer.pop_slice(&mut self.scratch);
        let read_frames = read / self.source_channels.max(1);

        if read_frames < frames {
            self.underflows.fetch_add(1, Ordering::Relaxed);
        }

        for (i, frame) in data.chunks_mut(self.device_channels).enumerate() {
            if i >= read_frames {
                frame.fill(silence);
                continue;
            }
            let src = &self.scratch[i * self.source_channels..(i + 1) * self.source_channels];
            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = convert(src[c.min(self.source_channels - 1)]);
            }
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut feed: RingFeed,
    error_flag: &Arc<AtomicBool>,
    convert: fn(f32) -> T,
) -> Result<Stream>
where
    T: cpal::SizedSample + Send + 'static,
{
    let error_flag = Arc::clone(error_flag);
    let silence = convert(0.0);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                feed.fill(data, silence, convert);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

/// Writing side of the ring
///
/// Pushes whole frames and waits while the ring is full. An error reported by
/// the stream callback is returned from one `write` and then cleared, so a
/// transient stream error costs one frame rather than the rest of the mix.
struct RingWriter {
    producer: HeapProd<f32>,
    channels: usize,
    error_flag: Arc<AtomicBool>,
    /// Consecutive failed writes
    error_count: u32,
    /// A full ring that does not drain for this long means the stream is dead
    stall_timeout: Duration,
}

impl RingWriter {
    fn new(producer: HeapProd<f32>, channels: usize, error_flag: Arc<AtomicBool>) -> Self {
        Self {
            producer,
            channels: channels.max(1),
            error_flag,
            error_count: 0,
            stall_timeout: Duration::from_secs(1),
        }
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let mut remaining = samples;
        let mut last_progress = Instant::now();

        while !remaining.is_empty() {
            if self.error_flag.swap(false, Ordering::SeqCst) {
                return Err(self.fail("Audio stream reported an error"));
            }

            let room = self.producer.vacant_len() / self.channels * self.channels;
            let written = self.producer.push_slice(&remaining[..room.min(remaining.len())]);
            remaining = &remaining[written..];

            if remaining.is_empty() {
                break;
            }
            if written > 0 {
                last_progress = Instant::now();
            } else if last_progress.elapsed() >= self.stall_timeout {
                return Err(self.fail("Audio stream stalled"));
            }
            thread::sleep(Duration::from_millis(2));
        }

        if self.error_count > 0 {
            debug!("Audio output recovered after {} failed writes", self.error_count);
            self.error_count = 0;
        }
        Ok(())
    }

    fn fail(&mut self, reason: &str) -> Error {
        self.error_count += 1;
        Error::AudioOutput(format!("{} ({} consecutive)", reason, self.error_count))
    }
}

/// cpal output stream fed through a ring buffer
pub struct CpalOutput {
    stream: Option<Stream>,
    writer: RingWriter,
    underflows: Arc<AtomicU64>,
}

impl CpalOutput {
    /// Number of callbacks that ran short of samples
    pub fn underflow_count(&self) -> u64 {
        self.underflows.load(Ordering::Relaxed)
    }
}

impl OutputDevice for CpalOutput {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::AudioOutput("Audio stream is closed".to_string()));
        }
        self.writer.write(samples)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!(
                "Stopping audio stream ({} underflows)",
                self.underflow_count()
            );
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
