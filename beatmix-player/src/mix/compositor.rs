//! Crossfade compositor
//!
//! Mixes an outgoing buffer `a` with an incoming buffer `b` that starts
//! `start` samples into `a`. Inside the fade region the crossfade progress
//! runs from 0 to ½ over the fade-in span and from ½ to 1 over the fade-out
//! span, so both songs meet at the switch point. Before the region only `a`
//! plays; after it only `b`.

use beatmix_common::{CurvePair, CurvePolicy};

use super::FadeDescriptor;
use crate::audio::AudioBuffer;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossfade {
    start: usize,
    fade_in_samples: usize,
    fade_out_samples: usize,
    curves: CurvePair,
    /// `a` is the incoming side and `b` the outgoing one
    reversed: bool,
}

impl Crossfade {
    pub fn new(start: usize, fade_in_samples: usize, fade_out_samples: usize, curves: CurvePair) -> Self {
        Self {
            start,
            fade_in_samples,
            fade_out_samples,
            curves,
            reversed: false,
        }
    }

    /// Crossfade for a scheduled transition, with `b` starting at the head
    /// of `a`.
    pub fn for_transition(fade: &FadeDescriptor, samples_per_downbeat: f64, policy: &CurvePolicy) -> Self {
        let fade_in_samples = (fade.fade_in_len as f64 * samples_per_downbeat) as usize;
        let total_samples = (fade.total_len() as f64 * samples_per_downbeat) as usize;
        Self::new(
            0,
            fade_in_samples,
            total_samples - fade_in_samples,
            policy.curves_for(fade.fade_type),
        )
    }

    /// Length of the blended region in samples
    pub fn fade_len(&self) -> usize {
        self.fade_in_samples + self.fade_out_samples
    }

    /// The same mix with the roles of `a` and `b` exchanged: for a start of
    /// zero, `self.apply(a, b)` equals `self.swapped().apply(b, a)` whenever
    /// the curves are complementary.
    pub fn swapped(&self) -> Self {
        Self {
            curves: CurvePair {
                fade_in: self.curves.fade_out,
                fade_out: self.curves.fade_in,
            },
            reversed: !self.reversed,
            ..*self
        }
    }

    /// Mix `a` and `b` channel by channel.
    ///
    /// The output holds `max(len a, start + len b)` samples per channel.
    pub fn apply(&self, a: &AudioBuffer, b: &AudioBuffer) -> Result<AudioBuffer> {
        if a.channel_count() != b.channel_count() {
            return Err(Error::InvalidInput(format!(
                "cannot crossfade {} channels with {} channels",
                a.channel_count(),
                b.channel_count()
            )));
        }

        let out_len = a.len().max(self.start + b.len());
        let channels = a
            .channels()
            .iter()
            .zip(b.channels())
            .map(|(a, b)| self.mix_channel(a, b, out_len))
            .collect();

        Ok(AudioBuffer::from_channels(channels))
    }

    /// Crossfade progress at sample `j` of the fade region.
    fn progress(&self, j: usize) -> f32 {
        let t = if j < self.fade_in_samples {
            0.5 * j as f32 / self.fade_in_samples as f32
        } else {
            0.5 + 0.5 * (j - self.fade_in_samples) as f32 / self.fade_out_samples as f32
        };
        if self.reversed {
            1.0 - t
        } else {
            t
        }
    }

    fn mix_channel(&self, a: &[f32], b: &[f32], out_len: usize) -> Vec<f32> {
        let fade_len = self.fade_len();
        let mut out = Vec::with_capacity(out_len);

        for i in 0..out_len {
            let a_sample = a.get(i).copied().unwrap_or(0.0);
            if i < self.start {
                out.push(a_sample);
                continue;
            }

            let j = i - self.start;
            let b_sample = b.get(j).copied().unwrap_or(0.0);
            let sample = if j < fade_len {
                let t = self.progress(j);
                a_sample * self.curves.outgoing_gain(t) + b_sample * self.curves.incoming_gain(t)
            } else if self.reversed {
                a_sample
            } else {
                b_sample
            };
            out.push(sample);
        }

        out
    }
}
