//! # beatmix player library
//!
//! Real-time auto-DJ pipeline: songs are stretched onto a fixed master tempo,
//! crossfaded at downbeats and streamed to the audio device while the next
//! transition is being prepared.
//!
//! **Architecture:** producer thread → bounded channel → playback thread →
//! (optional) disk flush thread, coordinated through a small shared control
//! plane. Audio I/O uses hound + symphonia + rubato + cpal.

pub mod audio;
pub mod config;
pub mod error;
pub mod mix;
pub mod playback;
pub mod selector;
pub mod song;

pub use error::{Error, Result};
pub use mix::{MixParams, MixSources};
pub use playback::{MixController, MixSettings};
pub use selector::{SequentialSelector, TrackSelector};
pub use song::Song;
