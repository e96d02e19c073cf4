//! Core audio data types
//!
//! All audio inside the mixer is f32 in channel-major (planar) layout:
//! `channels[c][i]` is sample `i` of channel `c`. Mono audio is a single
//! channel; stereo is two. Interleaving only happens at the output device
//! and when writing recordings.

/// Sample rate every song is normalized to before mixing
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Planar multi-channel audio buffer
///
/// All channels always hold the same number of samples.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data.
    ///
    /// Channels longer than the shortest one are truncated so that the
    /// equal-length invariant holds.
    pub fn from_channels(mut channels: Vec<Vec<f32>>) -> Self {
        let len = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(len);
        }
        Self { channels }
    }

    pub fn mono(samples: Vec<f32>) -> Self {
        Self { channels: vec![samples] }
    }

    pub fn stereo(left: Vec<f32>, right: Vec<f32>) -> Self {
        Self::from_channels(vec![left, right])
    }

    /// Empty buffer with `channel_count` channels.
    pub fn empty(channel_count: usize) -> Self {
        Self { channels: vec![Vec::new(); channel_count] }
    }

    pub fn silent(channel_count: usize, len: usize) -> Self {
        Self { channels: vec![vec![0.0; len]; channel_count] }
    }

    /// Split interleaved samples `[L, R, L, R, ...]` into planar channels.
    pub fn from_interleaved(samples: &[f32], channel_count: usize) -> Self {
        if channel_count == 0 {
            return Self::default();
        }

        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Copy of samples `[start, end)`, clamped to the buffer length.
    pub fn slice(&self, start: usize, end: usize) -> AudioBuffer {
        let end = end.min(self.len());
        let start = start.min(end);
        Self {
            channels: self
                .channels
                .iter()
                .map(|c| c[start..end].to_vec())
                .collect(),
        }
    }

    /// Drop the first `count` samples of every channel.
    pub fn drain_front(&mut self, count: usize) {
        let count = count.min(self.len());
        for channel in &mut self.channels {
            channel.drain(..count);
        }
    }

    /// Append another buffer with the same channel layout.
    ///
    /// An empty, channel-less buffer adopts the layout of `other`.
    pub fn append(&mut self, other: &AudioBuffer) {
        if self.channels.is_empty() {
            self.channels = vec![Vec::new(); other.channel_count()];
        }
        for (channel, extra) in self.channels.iter_mut().zip(&other.channels) {
            channel.extend_from_slice(extra);
        }
    }

    /// Write samples `[start, end)` into `out` as interleaved frames.
    ///
    /// `out` is cleared first so it can be reused across frames.
    pub fn interleave_into(&self, start: usize, end: usize, out: &mut Vec<f32>) {
        out.clear();
        let end = end.min(self.len());
        let start = start.min(end);
        out.reserve((end - start) * self.channel_count());
        for i in start..end {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
    }

    /// Interleave the whole buffer.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::new();
        self.interleave_into(0, self.len(), &mut out);
        out
    }

    /// Duration in seconds at `sample_rate`
    pub fn duration_seconds(&self, sample_rate: u32) -> f64 {
        self.len() as f64 / sample_rate as f64
    }
}
