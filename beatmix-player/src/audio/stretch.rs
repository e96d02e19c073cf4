//! Time-stretch and pitch-shift transform
//!
//! The mixer treats the transform as a pure function over one channel of
//! samples. Output length must be within one sample of `len × tempo_ratio`
//! so that transition offsets stay sample-accurate.

use crate::audio::resampler::Resampler;
use crate::error::{Error, Result};
use tracing::debug;

pub trait TimeStretcher: Send {
    /// Stretch `samples` to `len × tempo_ratio` samples and shift the pitch by
    /// `semitones`.
    fn stretch_and_shift(&self, samples: &[f32], tempo_ratio: f64, semitones: i32) -> Result<Vec<f32>>;
}

/// Varispeed stretcher
///
/// Resamples by the tempo ratio, so tempo and pitch change together like a
/// turntable's pitch fader. Semitone offsets are not applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarispeedStretcher;

impl VarispeedStretcher {
    pub fn new() -> Self {
        Self
    }
}

impl TimeStretcher for VarispeedStretcher {
    fn stretch_and_shift(&self, samples: &[f32], tempo_ratio: f64, semitones: i32) -> Result<Vec<f32>> {
        if semitones != 0 {
            debug!("Varispeed ignores pitch shift of {} semitones", semitones);
        }

        if tempo_ratio == 1.0 {
            return Ok(samples.to_vec());
        }

        let input = [samples.to_vec()];
        let mut output = Resampler::resample_planar(&input, tempo_ratio)
            .map_err(|e| Error::Stretch(e.to_string()))?;

        Ok(output.pop().unwrap_or_default())
    }
}
