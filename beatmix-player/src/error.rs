//! Error types for beatmix-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for beatmix-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation called while the player is in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The track selector could not provide a next song or cue point
    #[error("Track selector exhausted: {0}")]
    SelectorExhausted(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Recording or tracklist storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Time-stretch / resampling errors
    #[error("Time-stretch error: {0}")]
    Stretch(String),

    /// Audio file decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Invalid song data or parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV reading or writing errors
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Annotation parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors from the shared library (config resolution, parsing)
    #[error(transparent)]
    Common(#[from] beatmix_common::Error),
}

/// Convenience Result type using beatmix-player Error
pub type Result<T> = std::result::Result<T, Error>;
