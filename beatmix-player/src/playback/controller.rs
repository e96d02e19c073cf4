//! Mix controller
//!
//! Owns the producer, consumer and disk worker threads and exposes the
//! transport operations. All threads share one [`ControlPlane`]; audio moves
//! only through bounded channels.

use beatmix_common::CurvePolicy;
use crossbeam_channel::{bounded, Receiver};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use super::{ConsumerStats, ControlPlane, DiskFlushWorker, MixRecorder, PlaybackConsumer, RecordingSettings};
use crate::audio::DeviceOpener;
use crate::error::{Error, Result};
use crate::mix::{MixParams, MixProducer, MixSources, ProducerExit, ProducerState, StreamItem};

/// Everything the controller needs besides its collaborators
#[derive(Debug, Clone)]
pub struct MixSettings {
    pub params: MixParams,
    pub curves: CurvePolicy,
    pub channels: u16,
    /// Samples per device write
    pub frame_len: usize,
    pub slice_queue_capacity: usize,
    pub save_queue_capacity: usize,
    pub recording: RecordingSettings,
    pub markfile_path: PathBuf,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            params: MixParams::default(),
            curves: CurvePolicy::default(),
            channels: 2,
            frame_len: 1024,
            slice_queue_capacity: 6,
            save_queue_capacity: 6,
            recording: RecordingSettings {
                output_dir: PathBuf::from("."),
                save_pattern: "mix_{}.wav".to_string(),
                tracklist_path: PathBuf::from("mix.txt"),
                threshold_secs: 15 * 60,
            },
            markfile_path: PathBuf::from("markfile.csv"),
        }
    }
}

pub struct MixController {
    settings: MixSettings,
    control: Arc<ControlPlane>,
    opener: Arc<dyn DeviceOpener>,
    /// Held here between runs, moved into the producer while it runs
    sources: Option<MixSources>,
    producer: Option<JoinHandle<ProducerExit>>,
    consumer: Option<JoinHandle<ConsumerStats>>,
    worker: Option<JoinHandle<Result<usize>>>,
    receiver: Option<Receiver<StreamItem>>,
}

impl MixController {
    pub fn new(settings: MixSettings, sources: MixSources, opener: Arc<dyn DeviceOpener>) -> Self {
        Self {
            settings,
            control: Arc::new(ControlPlane::new()),
            opener,
            sources: Some(sources),
            producer: None,
            consumer: None,
            worker: None,
            receiver: None,
        }
    }

    pub fn control(&self) -> Arc<ControlPlane> {
        Arc::clone(&self.control)
    }

    pub fn settings(&self) -> &MixSettings {
        &self.settings
    }

    /// Start the mix, or resume it when paused.
    ///
    /// Returns once the first slice is queued and the output device is open.
    pub fn play(&mut self, record: bool) -> Result<()> {
        match (&self.producer, &self.consumer) {
            (Some(_), Some(_)) => {
                debug!("Resuming playback");
                self.control.open_gate();
                return Ok(());
            }
            (None, None) => {}
            _ => {
                return Err(Error::InvalidState(
                    "producer and consumer threads are not both idle".to_string(),
                ))
            }
        }

        let sources = self.sources.take().ok_or_else(|| {
            Error::InvalidState("track selector was lost by a previous run".to_string())
        })?;

        self.control.set_running(true);
        self.control.clear_skip();
        self.control.open_gate();

        let (sender, receiver) = bounded(self.settings.slice_queue_capacity);
        let (ready_tx, ready_rx) = bounded(1);
        let producer = MixProducer::new(
            self.settings.params,
            self.settings.curves.clone(),
            sources,
            Arc::clone(&self.control),
            sender,
        )
        .with_ready_signal(ready_tx);

        let handle = thread::Builder::new()
            .name("mix-producer".to_string())
            .spawn(move || producer.run());
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                // The producer (and the sources it held) died with the closure
                self.control.set_running(false);
                return Err(e.into());
            }
        };
        self.producer = Some(handle);
        self.receiver = Some(receiver.clone());

        if ready_rx.recv().is_err() {
            debug!("Producer ended before queuing any audio");
            drop(receiver);
            self.stop()?;
            return Err(Error::InvalidState(
                "mix producer ended before producing any audio".to_string(),
            ));
        }

        if let Err(e) = self.start_consumer(receiver, record) {
            let _ = self.stop();
            return Err(e);
        }

        info!("Playback started{}", if record { " (recording)" } else { "" });
        Ok(())
    }

    fn start_consumer(&mut self, receiver: Receiver<StreamItem>, record: bool) -> Result<()> {
        let sample_rate = self.settings.params.sample_rate;

        let recorder = if record {
            fs::create_dir_all(&self.settings.recording.output_dir)?;
            let (save_tx, save_rx) = bounded(self.settings.save_queue_capacity);
            let worker = DiskFlushWorker::new(
                save_rx,
                self.settings.recording.tracklist_path.clone(),
                sample_rate,
            );
            self.worker = Some(worker.spawn()?);
            Some(MixRecorder::new(save_tx, self.settings.recording.clone(), sample_rate))
        } else {
            None
        };

        let consumer = PlaybackConsumer::new(
            receiver,
            Arc::clone(&self.control),
            self.settings.frame_len,
            sample_rate,
            recorder,
        );
        let opener = Arc::clone(&self.opener);
        let channels = self.settings.channels;
        let (opened_tx, opened_rx) = bounded::<Result<()>>(1);

        let handle = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || match opener.open(channels, sample_rate) {
                Ok(device) => {
                    let _ = opened_tx.send(Ok(()));
                    consumer.run(device)
                }
                Err(e) => {
                    let _ = opened_tx.send(Err(e));
                    consumer.abandon()
                }
            })?;
        self.consumer = Some(handle);

        match opened_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(Error::InvalidState(
                "playback thread exited before opening the device".to_string(),
            )),
        }
    }

    /// Pause at the next frame boundary.
    pub fn pause(&self) {
        if self.consumer.is_none() {
            return;
        }
        debug!("Pausing playback");
        self.control.close_gate();
    }

    /// Drop the rest of the segment being played.
    ///
    /// Refused with a warning when nothing is queued.
    pub fn skip(&self) {
        match self.receiver.as_ref() {
            Some(receiver) if !receiver.is_empty() => {
                info!("Skipping to next segment");
                self.control.request_skip();
            }
            _ => {
                self.control.clear_skip();
                warn!("Cannot skip to next segment, no audio in queue!");
            }
        }
    }

    /// Stop all threads and release the output device.
    ///
    /// Safe to call repeatedly. Returns the producer's failure if the stream
    /// ended on one.
    pub fn stop(&mut self) -> Result<()> {
        self.control.set_running(false);
        self.control.open_gate();

        if let Some(consumer) = self.consumer.take() {
            match consumer.join() {
                Ok(stats) => debug!(
                    "Playback consumer stopped: {} slices, {} frames, {} skips",
                    stats.slices, stats.frames, stats.skips
                ),
                Err(_) => error!("Playback consumer panicked"),
            }
        }

        // Last receiver gone: a producer blocked on a full channel wakes up
        self.receiver = None;

        let mut outcome = Ok(());
        if let Some(producer) = self.producer.take() {
            match producer.join() {
                Ok(exit) => {
                    self.sources = Some(exit.sources);
                    outcome = exit.outcome;
                }
                Err(_) => {
                    outcome = Err(Error::InvalidState("mix producer panicked".to_string()));
                }
            }
        }

        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(Ok(blocks)) => debug!("Disk flush worker wrote {} blocks", blocks),
                Ok(Err(e)) => error!("Disk flush worker failed: {}", e),
                Err(_) => error!("Disk flush worker panicked"),
            }
        }

        self.control.clear_skip();
        outcome
    }

    /// True while a stream has been started and is still playing.
    pub fn is_active(&self) -> bool {
        self.producer.as_ref().map_or(false, |h| !h.is_finished())
            || self.consumer.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub fn producer_state(&self) -> ProducerState {
        self.control.producer_state()
    }

    /// Title of the master currently heard
    pub fn current_master(&self) -> String {
        self.control.current_master()
    }

    /// Append the current master's title to the markfile.
    pub fn mark_current_master(&self) -> Result<String> {
        let title = self.control.current_master();
        if let Some(parent) = self.settings.markfile_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.settings.markfile_path)?;
        writeln!(file, "{}", title)?;
        debug!("{:20} has been marked for manual annotation.", title);
        Ok(title)
    }
}

impl Drop for MixController {
    fn drop(&mut self) {
        if self.producer.is_some() || self.consumer.is_some() {
            let _ = self.stop();
        }
    }
}

/// Titles previously marked with [`MixController::mark_current_master`].
///
/// A missing markfile means nothing was marked.
pub fn read_marked_titles(path: &Path) -> Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}
