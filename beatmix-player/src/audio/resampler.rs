//! Audio resampling using rubato
//!
//! Two uses: normalizing decoded songs to the mixer sample rate, and
//! varispeed time-stretching (resampling by the tempo ratio and playing the
//! result back at the original rate).

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler using rubato for sample rate conversion.
pub struct Resampler;

impl Resampler {
    /// Convert `input` from `input_rate` to `output_rate`.
    ///
    /// Returns a copy when the rates already match.
    pub fn resample(input: &AudioBuffer, input_rate: u32, output_rate: u32) -> Result<AudioBuffer> {
        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(input.clone());
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels)",
            input_rate,
            output_rate,
            input.channel_count()
        );

        let ratio = output_rate as f64 / input_rate as f64;
        let channels = Self::resample_planar(input.channels(), ratio)?;
        Ok(AudioBuffer::from_channels(channels))
    }

    /// Resample planar channels by `ratio` (output length / input length).
    ///
    /// The resampler's group delay is removed and every channel is fitted to
    /// exactly `round(len × ratio)` samples, padding with silence or
    /// truncating as needed.
    pub fn resample_planar(channels: &[Vec<f32>], ratio: f64) -> Result<Vec<Vec<f32>>> {
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(Error::Decode(format!("Invalid resample ratio: {}", ratio)));
        }

        let input_frames = channels.first().map(Vec::len).unwrap_or(0);
        let target_frames = (input_frames as f64 * ratio).round() as usize;

        if input_frames == 0 {
            return Ok(vec![Vec::new(); channels.len()]);
        }

        let mut resampler = Self::create_resampler(ratio, channels.len(), input_frames)?;
        let delay = resampler.output_delay();

        let mut output = resampler
            .process(channels, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        // Flush the tail still held back by the interpolation window
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| Error::Decode(format!("Resampler flush failed: {}", e)))?;
        for (channel, rest) in output.iter_mut().zip(tail) {
            channel.extend(rest);
        }

        for channel in &mut output {
            let skip = delay.min(channel.len());
            channel.drain(..skip);
            channel.resize(target_frames, 0.0);
        }

        debug!(
            "Resampled {} input frames to {} output frames (delay {})",
            input_frames, target_frames, delay
        );

        Ok(output)
    }

    /// Create a rubato resampler that consumes the whole input in one chunk.
    fn create_resampler(ratio: f64, channels: usize, chunk_size: usize) -> Result<FastFixedIn<f32>> {
        FastFixedIn::<f32>::new(
            ratio,
            1.0, // max_relative_ratio (no runtime changes)
            PolynomialDegree::Septic,
            chunk_size,
            channels,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frames: usize, rate: u32) -> Vec<f32> {
        (0..frames)
            .map(|i| {
                let t = i as f32 / rate as f32;
                (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
            })
            .collect()
    }

    #[test]
    fn test_resample_same_rate() {
        let input = AudioBuffer::stereo(vec![0.1, 0.3, 0.5], vec![0.2, 0.4, 0.6]);
        let output = Resampler::resample(&input, 44100, 44100).unwrap();

        assert_eq!(output, input);
    }

    #[test]
    fn test_resample_different_rate() {
        let frames = 4800;
        let samples = sine(frames, 48000);
        let input = AudioBuffer::stereo(samples.clone(), samples);

        let output = Resampler::resample(&input, 48000, 44100).unwrap();

        assert_eq!(output.channel_count(), 2);
        assert_eq!(output.len(), 4410);
    }

    #[test]
    fn test_resample_planar_fits_length() {
        let input = vec![sine(1000, 44100)];

        let slower = Resampler::resample_planar(&input, 1.25).unwrap();
        assert_eq!(slower[0].len(), 1250);

        let faster = Resampler::resample_planar(&input, 0.8).unwrap();
        assert_eq!(faster[0].len(), 800);
    }

    #[test]
    fn test_resample_planar_empty_input() {
        let input = vec![Vec::new(), Vec::new()];
        let output = Resampler::resample_planar(&input, 1.5).unwrap();

        assert_eq!(output.len(), 2);
        assert!(output[0].is_empty());
    }

    #[test]
    fn test_resample_planar_rejects_bad_ratio() {
        let input = vec![vec![0.0; 16]];
        assert!(Resampler::resample_planar(&input, 0.0).is_err());
        assert!(Resampler::resample_planar(&input, f64::NAN).is_err());
    }
}
