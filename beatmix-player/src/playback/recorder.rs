//! Mix recording
//!
//! [`MixRecorder`] lives on the playback thread and accumulates everything
//! the consumer dequeues. Once the accumulated audio passes the threshold it
//! is handed as one block to the [`DiskFlushWorker`], which writes it out on
//! its own thread so disk I/O never touches playback timing.

use crossbeam_channel::{Receiver, Sender};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};

/// Where and how often recordings are written
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    /// File name pattern; `{}` is replaced by the 1-based block number
    pub save_pattern: String,
    pub tracklist_path: PathBuf,
    /// Accumulated audio length that triggers a flush
    pub threshold_secs: u64,
}

impl RecordingSettings {
    /// Destination of block number `index`.
    pub fn destination(&self, index: usize) -> PathBuf {
        self.output_dir
            .join(self.save_pattern.replace("{}", &index.to_string()))
    }
}

/// Message on the consumer → disk worker channel
#[derive(Debug, Clone)]
pub enum SaveItem {
    Block {
        destination: PathBuf,
        audio: AudioBuffer,
        titles: Vec<String>,
    },
    Stop,
}

/// Consumer-side accumulator
pub struct MixRecorder {
    sender: Sender<SaveItem>,
    settings: RecordingSettings,
    threshold_samples: usize,
    block_index: usize,
    audio: AudioBuffer,
    titles: Vec<String>,
    enabled: bool,
}

impl MixRecorder {
    pub fn new(sender: Sender<SaveItem>, settings: RecordingSettings, sample_rate: u32) -> Self {
        let threshold_samples = settings.threshold_secs as usize * sample_rate as usize;
        Self {
            sender,
            settings,
            threshold_samples,
            block_index: 0,
            audio: AudioBuffer::default(),
            titles: Vec::new(),
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Samples accumulated since the last flush
    pub fn pending_len(&self) -> usize {
        self.audio.len()
    }

    /// Append one dequeued slice.
    pub fn record(&mut self, audio: &AudioBuffer, master_title: &str) {
        if !self.enabled {
            return;
        }
        self.audio.append(audio);
        self.titles.push(master_title.to_string());

        if self.audio.len() > self.threshold_samples {
            self.flush();
        }
    }

    /// Send everything accumulated as one block. Blocks while the worker's
    /// queue is full.
    pub fn flush(&mut self) {
        if !self.enabled {
            return;
        }
        self.block_index += 1;
        let item = SaveItem::Block {
            destination: self.settings.destination(self.block_index),
            audio: std::mem::take(&mut self.audio),
            titles: std::mem::take(&mut self.titles),
        };

        if self.sender.send(item).is_err() {
            warn!("Disk flush worker is gone, recording disabled");
            self.enabled = false;
        }
    }

    /// Flush what is left and tell the worker to stop.
    pub fn finish(mut self) {
        if !self.audio.is_empty() {
            debug!("Flushing recorded audio to disk");
            self.flush();
        }
        if self.enabled {
            let _ = self.sender.send(SaveItem::Stop);
        }
    }
}

/// Writes recorded blocks as WAV files and appends their titles to the
/// tracklist
pub struct DiskFlushWorker {
    receiver: Receiver<SaveItem>,
    tracklist_path: PathBuf,
    sample_rate: u32,
}

impl DiskFlushWorker {
    pub fn new(receiver: Receiver<SaveItem>, tracklist_path: PathBuf, sample_rate: u32) -> Self {
        Self {
            receiver,
            tracklist_path,
            sample_rate,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<Result<usize>>> {
        Ok(thread::Builder::new()
            .name("disk-flush".to_string())
            .spawn(move || self.run())?)
    }

    /// Write blocks until told to stop or the sender is gone. Returns the
    /// number of blocks written; a storage failure ends the worker.
    pub fn run(self) -> Result<usize> {
        let mut written = 0;
        loop {
            match self.receiver.recv() {
                Ok(SaveItem::Block {
                    destination,
                    audio,
                    titles,
                }) => {
                    if let Err(e) = self.write_block(&destination, &audio, &titles) {
                        error!("Saving {} failed: {}", destination.display(), e);
                        return Err(e);
                    }
                    written += 1;
                }
                Ok(SaveItem::Stop) | Err(_) => {
                    debug!("Stopping disk flush worker");
                    return Ok(written);
                }
            }
        }
    }

    fn write_block(&self, destination: &Path, audio: &AudioBuffer, titles: &[String]) -> Result<()> {
        debug!(
            "Saving {} to disk, length {}",
            destination.display(),
            audio.len()
        );
        write_wav(destination, audio, self.sample_rate)
            .map_err(|e| Error::Storage(format!("{}: {}", destination.display(), e)))?;

        let mut tracklist = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.tracklist_path)
            .map_err(|e| Error::Storage(format!("{}: {}", self.tracklist_path.display(), e)))?;
        for title in titles {
            writeln!(tracklist, "{}", title)
                .map_err(|e| Error::Storage(format!("{}: {}", self.tracklist_path.display(), e)))?;
        }

        info!("Saved {} ({} titles)", destination.display(), titles.len());
        Ok(())
    }
}

/// Write `audio` as a 32-bit float WAV file.
pub fn write_wav(path: &Path, audio: &AudioBuffer, sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channel_count().max(1) as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in audio.interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
