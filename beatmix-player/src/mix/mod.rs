//! Mix scheduling and synthesis
//!
//! - `timeline`: sample-accurate transition events, re-based every cycle
//! - `window`: which songs are audible and which one is master
//! - `compositor`: crossfade synthesis between two buffers
//! - `producer`: the loop that turns selector decisions into output slices

pub mod compositor;
pub mod producer;
pub mod timeline;
pub mod window;

use beatmix_common::FadeType;

use crate::audio::{AudioBuffer, DEFAULT_SAMPLE_RATE};

pub use compositor::Crossfade;
pub use producer::{MixProducer, MixSources, ProducerExit, ProducerState};
pub use timeline::{TransitionEvent, TransitionKind, TransitionOffsets, TransitionTimeline};
pub use window::PlayingWindow;

/// Fixed musical grid every song is stretched onto
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixParams {
    pub sample_rate: u32,
    /// Tempo (BPM) all songs are time-stretched to
    pub master_tempo: f64,
    pub beats_per_downbeat: u32,
    /// Fade-in length assumed before the very first song
    pub initial_fade_in_len: u32,
    /// Extra downbeats synthesized past each fade
    pub lookahead_downbeats: u32,
}

impl MixParams {
    /// Samples in one downbeat at the master tempo
    pub fn samples_per_downbeat(&self) -> f64 {
        self.sample_rate as f64 * self.beats_per_downbeat as f64 * 60.0 / self.master_tempo
    }

    /// Stretch factor taking a song at `tempo` to the master tempo
    pub fn tempo_ratio(&self, tempo: f64) -> f64 {
        tempo / self.master_tempo
    }
}

impl Default for MixParams {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            master_tempo: 175.0,
            beats_per_downbeat: 4,
            initial_fade_in_len: 16,
            lookahead_downbeats: 2,
        }
    }
}

/// Length and style of one transition, in master downbeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeDescriptor {
    pub fade_in_len: u32,
    pub fade_out_len: u32,
    pub fade_type: FadeType,
}

impl FadeDescriptor {
    pub fn total_len(&self) -> u32 {
        self.fade_in_len + self.fade_out_len
    }
}

/// Unit of audio pushed from the producer to the playback consumer
#[derive(Debug, Clone)]
pub struct OutputSlice {
    pub audio: AudioBuffer,
    /// Human-readable "now playing" text
    pub description: String,
    pub master_title: String,
    /// Position of the master in the whole stream, starting at 0
    pub master_index: usize,
    /// Songs audible during the slice
    pub audible: usize,
}

/// Message on the producer → consumer channel
#[derive(Debug, Clone)]
pub enum StreamItem {
    Slice(OutputSlice),
    /// No more slices will follow
    EndOfStream,
}
