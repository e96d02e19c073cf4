//! Audio data, I/O and transforms

pub mod decode;
pub mod loader;
pub mod output;
pub mod resampler;
pub mod stretch;
pub mod types;

pub use loader::{FileSong, SongAnnotations, SongLibrary};
pub use output::{CpalOpener, CpalOutput, DeviceOpener, OutputDevice};
pub use resampler::Resampler;
pub use stretch::{TimeStretcher, VarispeedStretcher};
pub use types::{AudioBuffer, DEFAULT_SAMPLE_RATE};
