//! Common error types for beatmix

use thiserror::Error;

/// Common result type for beatmix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the beatmix crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid user input or parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
