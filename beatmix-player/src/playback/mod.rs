//! Playback: consumer loop, recording and transport control

pub mod consumer;
pub mod control;
pub mod controller;
pub mod recorder;

pub use consumer::{ConsumerStats, PlaybackConsumer};
pub use control::ControlPlane;
pub use controller::{read_marked_titles, MixController, MixSettings};
pub use recorder::{DiskFlushWorker, MixRecorder, RecordingSettings, SaveItem};
