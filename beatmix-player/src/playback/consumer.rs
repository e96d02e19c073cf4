//! Playback consumer loop
//!
//! Pulls slices off the stream channel and writes them to the output device
//! in fixed-size frames, checking the control plane before every frame.

use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ControlPlane, MixRecorder};
use crate::audio::OutputDevice;
use crate::mix::StreamItem;

/// Counters reported when the consumer ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub slices: usize,
    pub frames: usize,
    pub skips: usize,
    pub write_errors: usize,
}

pub struct PlaybackConsumer {
    receiver: Receiver<StreamItem>,
    control: Arc<ControlPlane>,
    frame_len: usize,
    sample_rate: u32,
    recorder: Option<MixRecorder>,
}

impl PlaybackConsumer {
    pub fn new(
        receiver: Receiver<StreamItem>,
        control: Arc<ControlPlane>,
        frame_len: usize,
        sample_rate: u32,
        recorder: Option<MixRecorder>,
    ) -> Self {
        Self {
            receiver,
            control,
            frame_len: frame_len.max(1),
            sample_rate: sample_rate.max(1),
            recorder,
        }
    }

    /// Play until stopped or the end of the stream, then flush the recording
    /// and close `device`.
    pub fn run(mut self, mut device: Box<dyn OutputDevice>) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        let mut frame = Vec::with_capacity(self.frame_len * 2);

        'stream: while self.control.is_running() {
            let slice = match self.receiver.recv() {
                Ok(StreamItem::Slice(slice)) => slice,
                Ok(StreamItem::EndOfStream) => {
                    debug!("End of mix stream");
                    break;
                }
                Err(_) => {
                    debug!("Mix stream disconnected");
                    break;
                }
            };

            info!("{}", slice.description);
            self.control.set_current_master(&slice.master_title);
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.record(&slice.audio, &slice.master_title);
            }
            stats.slices += 1;

            let len = slice.audio.len();
            let mut start = 0;
            while start < len {
                self.control.wait_for_gate();
                if !self.control.is_running() {
                    break 'stream;
                }
                if self.control.take_skip() {
                    debug!("Skipping the rest of the current segment");
                    stats.skips += 1;
                    break;
                }

                let end = (start + self.frame_len).min(len);
                slice.audio.interleave_into(start, end, &mut frame);
                if let Err(e) = device.write(&frame) {
                    warn!("Output underflow: {}", e);
                    stats.write_errors += 1;
                    // Keep real-time pace while the device is not consuming
                    thread::sleep(self.frame_duration(end - start));
                }
                stats.frames += 1;
                start = end;
            }
        }

        debug!("Stopping music");
        self.finish();
        if let Err(e) = device.close() {
            warn!("Closing output device failed: {}", e);
        }
        stats
    }

    fn frame_duration(&self, frames: usize) -> Duration {
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// End without ever playing, e.g. when no device could be opened.
    pub fn abandon(self) -> ConsumerStats {
        self.finish();
        ConsumerStats::default()
    }

    fn finish(self) {
        if let Some(recorder) = self.recorder {
            recorder.finish();
        }
    }
}
