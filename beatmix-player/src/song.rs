//! Song handles
//!
//! A [`Song`] is owned by whoever supplies it (normally the track selector).
//! The mixer only holds one for the duration of a playback cycle, opening its
//! metadata and audio when it becomes the master and closing both once its
//! last transition has been scheduled.

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};

/// Annotated song with an explicit open/close lifecycle
///
/// Metadata accessors return empty values while the song is closed. Audio is
/// loaded separately by [`Song::open_audio`] so that selectors can inspect
/// metadata of many candidates without decoding them.
pub trait Song: Send {
    fn title(&self) -> &str;

    /// Load metadata (tempo, beats, downbeats, segments). Idempotent.
    fn open(&mut self) -> Result<()>;

    /// Release metadata and audio.
    fn close(&mut self);

    /// Load decoded audio. Idempotent.
    fn open_audio(&mut self) -> Result<()>;

    /// Release decoded audio only.
    fn close_audio(&mut self);

    /// Tempo in beats per minute
    fn tempo(&self) -> f64;

    /// Downbeat timestamps in seconds, ascending
    fn downbeats(&self) -> &[f64];

    /// Beat timestamps in seconds, ascending
    fn beats(&self) -> &[f64];

    /// Structural segment boundaries as downbeat indices, ascending
    fn segment_indices(&self) -> &[usize];

    /// Decoded audio at the mixer sample rate, `None` until `open_audio`
    fn audio(&self) -> Option<&AudioBuffer>;

    /// Timestamp of downbeat `index` in seconds.
    fn downbeat(&self, index: usize) -> Result<f64> {
        self.downbeats().get(index).copied().ok_or_else(|| {
            Error::InvalidInput(format!(
                "downbeat {} out of range for '{}' ({} downbeats)",
                index,
                self.title(),
                self.downbeats().len()
            ))
        })
    }
}

impl std::fmt::Debug for dyn Song {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Song")
            .field("title", &self.title())
            .field("tempo", &self.tempo())
            .field("downbeats", &self.downbeats().len())
            .finish()
    }
}
