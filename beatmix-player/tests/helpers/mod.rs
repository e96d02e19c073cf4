//! Test doubles for beatmix-player integration tests
//!
//! - SyntheticSong: in-memory song on an exact downbeat grid
//! - ResizeStretcher: nearest-sample time stretch, no DSP
//! - CaptureOpener: output device that counts what it is given

#![allow(dead_code)]

use beatmix_player::audio::{AudioBuffer, DeviceOpener, OutputDevice, TimeStretcher};
use beatmix_player::error::{Error, Result};
use beatmix_player::Song;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Song with evenly spaced downbeats and constant-valued audio
#[derive(Debug, Clone)]
pub struct SyntheticSong {
    title: String,
    tempo: f64,
    beats_per_downbeat: u32,
    downbeats: Vec<f64>,
    beats: Vec<f64>,
    segments: Vec<usize>,
    channels: usize,
    sample_rate: u32,
    level: f32,
    audio: Option<AudioBuffer>,
}

impl SyntheticSong {
    pub fn new(title: &str, tempo: f64, downbeat_count: usize, sample_rate: u32) -> Self {
        let beats_per_downbeat = 4;
        let beat_len = 60.0 / tempo;
        let downbeats = (0..downbeat_count)
            .map(|i| i as f64 * beat_len * beats_per_downbeat as f64)
            .collect();
        let beats = (0..downbeat_count * beats_per_downbeat as usize)
            .map(|i| i as f64 * beat_len)
            .collect();

        Self {
            title: title.to_string(),
            tempo,
            beats_per_downbeat,
            downbeats,
            beats,
            segments: Vec::new(),
            channels: 2,
            sample_rate,
            level: 0.5,
            audio: None,
        }
    }

    /// Every sample of the song equals `level`.
    pub fn with_level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    pub fn with_segments(mut self, segments: Vec<usize>) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Length in samples: one downbeat past the last annotated one
    pub fn sample_len(&self) -> usize {
        let downbeat_secs = 60.0 / self.tempo * self.beats_per_downbeat as f64;
        (self.downbeats.len() as f64 * downbeat_secs * self.sample_rate as f64).round() as usize
    }
}

impl Song for SyntheticSong {
    fn title(&self) -> &str {
        &self.title
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.audio = None;
    }

    fn open_audio(&mut self) -> Result<()> {
        if self.audio.is_none() {
            let len = self.sample_len();
            self.audio = Some(AudioBuffer::from_channels(vec![vec![self.level; len]; self.channels]));
        }
        Ok(())
    }

    fn close_audio(&mut self) {
        self.audio = None;
    }

    fn tempo(&self) -> f64 {
        self.tempo
    }

    fn downbeats(&self) -> &[f64] {
        &self.downbeats
    }

    fn beats(&self) -> &[f64] {
        &self.beats
    }

    fn segment_indices(&self) -> &[usize] {
        &self.segments
    }

    fn audio(&self) -> Option<&AudioBuffer> {
        self.audio.as_ref()
    }
}

/// Stretches by repeating or dropping samples
#[derive(Debug, Clone, Copy, Default)]
pub struct ResizeStretcher;

impl TimeStretcher for ResizeStretcher {
    fn stretch_and_shift(&self, samples: &[f32], tempo_ratio: f64, _semitones: i32) -> Result<Vec<f32>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        let out_len = (samples.len() as f64 * tempo_ratio).round() as usize;
        Ok((0..out_len)
            .map(|i| samples[((i as f64 / tempo_ratio) as usize).min(samples.len() - 1)])
            .collect())
    }
}

/// Shared counters of a [`CaptureOpener`]
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub opens: AtomicUsize,
    pub writes: AtomicUsize,
    /// Interleaved samples written
    pub samples: AtomicUsize,
    pub closes: AtomicUsize,
}

impl CaptureStats {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Opens devices that discard audio after counting it
#[derive(Debug, Clone, Default)]
pub struct CaptureOpener {
    pub stats: Arc<CaptureStats>,
    /// Sleep per write, simulating a real-time device
    pub write_delay: Option<Duration>,
    pub fail: bool,
}

impl CaptureOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(write_delay: Duration) -> Self {
        Self {
            write_delay: Some(write_delay),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl DeviceOpener for CaptureOpener {
    fn open(&self, _channels: u16, _sample_rate: u32) -> Result<Box<dyn OutputDevice>> {
        if self.fail {
            return Err(Error::AudioOutput("no output device available".to_string()));
        }
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CaptureDevice {
            stats: Arc::clone(&self.stats),
            write_delay: self.write_delay,
        }))
    }
}

pub struct CaptureDevice {
    stats: Arc<CaptureStats>,
    write_delay: Option<Duration>,
}

impl OutputDevice for CaptureDevice {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        if let Some(delay) = self.write_delay {
            std::thread::sleep(delay);
        }
        self.stats.writes.fetch_add(1, Ordering::SeqCst);
        self.stats.samples.fetch_add(samples.len(), Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
