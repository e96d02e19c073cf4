//! Mix producer loop
//!
//! One cycle per song: emit every slice of the mix buffer up to the next
//! song's entry point, cut the buffer there, ask the selector what follows,
//! stretch the new master onto the master tempo and crossfade it into the
//! remaining tail.
//!
//! The crossfade applied in a cycle is the one scheduled in the cycle before:
//! a transition's in-point ends one cycle and its fade spans the start of the
//! next.

use beatmix_common::{CurvePolicy, FadeType};
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    Crossfade, FadeDescriptor, MixParams, OutputSlice, PlayingWindow, StreamItem, TransitionKind,
    TransitionOffsets, TransitionTimeline,
};
use crate::audio::{AudioBuffer, TimeStretcher};
use crate::error::{Error, Result};
use crate::playback::ControlPlane;
use crate::selector::{NextTransition, TrackSelector};
use crate::song::Song;

/// Producer lifecycle, published on the [`ControlPlane`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerState {
    #[default]
    Init,
    Steady,
    Draining,
    Stopped,
}

/// Collaborators the producer borrows for one run
pub struct MixSources {
    pub selector: Box<dyn TrackSelector>,
    pub stretcher: Box<dyn TimeStretcher>,
}

impl std::fmt::Debug for MixSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixSources").finish_non_exhaustive()
    }
}

/// What a finished producer hands back to its owner
#[derive(Debug)]
pub struct ProducerExit {
    pub sources: MixSources,
    /// `Err` when the stream ended on a failure rather than a stop request
    pub outcome: Result<()>,
    pub slices_emitted: usize,
}

/// Song currently anchoring the schedule, with what follows it
struct Cycle {
    master: Box<dyn Song>,
    next: NextTransition,
    /// Fade scheduled for `next`, applied one cycle later
    fade: FadeDescriptor,
    /// Buffer offset where `next` comes in
    cut_point: i64,
}

pub struct MixProducer {
    params: MixParams,
    curves: CurvePolicy,
    sources: MixSources,
    control: Arc<ControlPlane>,
    sender: Sender<StreamItem>,
    ready: Option<Sender<()>>,
    timeline: TransitionTimeline,
    window: PlayingWindow,
    buffer: AudioBuffer,
    /// Kind of the last event reached; applied when the next one is reached
    pending_kind: TransitionKind,
    slices_emitted: usize,
}

impl MixProducer {
    pub fn new(
        params: MixParams,
        curves: CurvePolicy,
        sources: MixSources,
        control: Arc<ControlPlane>,
        sender: Sender<StreamItem>,
    ) -> Self {
        Self {
            params,
            curves,
            sources,
            control,
            sender,
            ready: None,
            timeline: TransitionTimeline::new(),
            window: PlayingWindow::new(),
            buffer: AudioBuffer::default(),
            pending_kind: TransitionKind::In,
            slices_emitted: 0,
        }
    }

    /// Signal `ready` once the first slice is queued.
    pub fn with_ready_signal(mut self, ready: Sender<()>) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Produce until stopped, disconnected or failed, then send the
    /// end-of-stream marker.
    pub fn run(mut self) -> ProducerExit {
        self.control.set_producer_state(ProducerState::Init);
        let outcome = self.produce();
        if let Err(e) = &outcome {
            error!("Mix producer failed: {}", e);
        }

        self.control.set_producer_state(ProducerState::Draining);
        if self.sender.send(StreamItem::EndOfStream).is_err() {
            debug!("Consumer gone before end of stream");
        }
        self.control.set_producer_state(ProducerState::Stopped);
        info!("Mix producer stopped after {} slices", self.slices_emitted);

        ProducerExit {
            sources: self.sources,
            outcome,
            slices_emitted: self.slices_emitted,
        }
    }

    fn produce(&mut self) -> Result<()> {
        let mut cycle = self.start()?;
        self.control.set_producer_state(ProducerState::Steady);

        loop {
            if !self.emit_until(cycle.cut_point) {
                return Ok(());
            }
            cycle = self.advance(cycle)?;
        }
    }

    /// Open the first song and build the first mix buffer.
    fn start(&mut self) -> Result<Cycle> {
        let mut master = self.sources.selector.first_song()?;
        master.open()?;
        master.open_audio()?;
        info!("First song: {}", master.title());

        let cue_in = master.segment_indices().first().copied().unwrap_or(0);
        let entry_fade_in = self.params.initial_fade_in_len;
        self.window.push_title(master.title());

        let (next, fade) = self.choose_next(master.as_ref(), cue_in + entry_fade_in as usize, FadeType::Chill)?;
        let offsets = self.schedule(master.as_ref(), 0, &next, &fade)?;

        let ratio = self.params.tempo_ratio(master.tempo());
        let end = self.read_end(master.as_ref(), next.cue_out, &fade, ratio)?;
        debug!("Master tempo {:.2} BPM, stretch {:.4}", master.tempo(), ratio);
        self.buffer = self.stretch_range(master.as_ref(), 0, end, ratio, 0)?;
        master.close_audio();

        Ok(Cycle {
            master,
            next,
            fade,
            cut_point: offsets.in_offset,
        })
    }

    /// Cut the buffer at the previous cut point and bring in the next master.
    fn advance(&mut self, cycle: Cycle) -> Result<Cycle> {
        let Cycle {
            mut master,
            next,
            fade: prev_fade,
            cut_point,
        } = cycle;

        self.timeline.rebase(cut_point);
        self.buffer.drain_front(cut_point.max(0) as usize);
        master.close();

        let NextTransition {
            song: mut master,
            cue_next_in: cue_in,
            ..
        } = next;
        master.open()?;
        info!("Mixing in: {}", master.title());

        let (next, fade) = self.choose_next(
            master.as_ref(),
            cue_in + prev_fade.fade_in_len as usize,
            prev_fade.fade_type,
        )?;

        let anchor = (master.downbeat(cue_in)? * self.params.sample_rate as f64) as i64;
        let offsets = self.schedule(master.as_ref(), anchor, &next, &fade)?;

        master.open_audio()?;
        let ratio = self.params.tempo_ratio(master.tempo());
        let end = self.read_end(master.as_ref(), next.cue_out, &fade, ratio)?;
        let incoming = self.stretch_range(
            master.as_ref(),
            anchor.max(0) as usize,
            end,
            ratio,
            next.semitone_offset,
        )?;
        master.close_audio();

        let crossfade = Crossfade::for_transition(
            &prev_fade,
            self.params.samples_per_downbeat(),
            &self.curves,
        );
        self.buffer = crossfade.apply(&self.buffer, &incoming)?;

        Ok(Cycle {
            master,
            next,
            fade,
            cut_point: offsets.in_offset,
        })
    }

    /// Ask the selector for the master's cue-out and the song after it.
    fn choose_next(
        &mut self,
        master: &dyn Song,
        cue_in: usize,
        prev_fade_type: FadeType,
    ) -> Result<(NextTransition, FadeDescriptor)> {
        let queue = self
            .sources
            .selector
            .master_queue(master, cue_in, prev_fade_type)?;
        let next = self.sources.selector.best_next_song(
            master,
            queue.cue_out,
            queue.max_fade_in_len,
            queue.fade_out_len,
            queue.fade_type,
        )?;

        let fade = FadeDescriptor {
            fade_in_len: next.fade_in_len,
            fade_out_len: queue.fade_out_len,
            fade_type: queue.fade_type,
        };
        debug!(
            "Next: '{}' at downbeat {} of '{}' ({} in {} / out {})",
            next.song.title(),
            next.cue_out,
            master.title(),
            fade.fade_type,
            fade.fade_in_len,
            fade.fade_out_len
        );
        Ok((next, fade))
    }

    /// Insert the events of the transition into `next` and add its title.
    fn schedule(
        &mut self,
        master: &dyn Song,
        anchor: i64,
        next: &NextTransition,
        fade: &FadeDescriptor,
    ) -> Result<TransitionOffsets> {
        let offsets = TransitionOffsets::compute(&self.params, master, anchor, next.cue_out, fade)?;
        self.window.push_title(next.song.title());
        self.timeline.schedule(offsets, fade.fade_type);
        Ok(offsets)
    }

    /// Native sample up to which the master is read: past the cue-out by the
    /// fade plus the lookahead, in master-tempo downbeats.
    fn read_end(&self, master: &dyn Song, cue_out: usize, fade: &FadeDescriptor, ratio: f64) -> Result<usize> {
        let tail_downbeats = (fade.total_len() + self.params.lookahead_downbeats) as f64;
        let cue_sample = master.downbeat(cue_out)? * self.params.sample_rate as f64;
        Ok((cue_sample + tail_downbeats * self.params.samples_per_downbeat() / ratio) as usize)
    }

    fn stretch_range(
        &self,
        song: &dyn Song,
        start: usize,
        end: usize,
        ratio: f64,
        semitones: i32,
    ) -> Result<AudioBuffer> {
        let audio = song
            .audio()
            .ok_or_else(|| Error::InvalidState(format!("audio of '{}' is not open", song.title())))?;
        let range = audio.slice(start, end);
        if range.len() < end.saturating_sub(start) {
            warn!(
                "'{}' ends {} samples before the requested range",
                song.title(),
                end.saturating_sub(start) - range.len()
            );
        }

        let channels = range
            .channels()
            .iter()
            .map(|channel| self.sources.stretcher.stretch_and_shift(channel, ratio, semitones))
            .collect::<Result<Vec<_>>>()?;
        Ok(AudioBuffer::from_channels(channels))
    }

    /// Emit slices for every event up to `cut_point`. Returns false when the
    /// stream should end.
    fn emit_until(&mut self, cut_point: i64) -> bool {
        let due: Vec<_> = self.timeline.due(cut_point).copied().collect();
        let mut boundary = 0i64;

        for event in due {
            self.window.apply(self.pending_kind);
            self.pending_kind = event.kind;

            debug_assert_eq!(self.window.audible() as isize, self.window.net_events());

            if event.offset > boundary {
                let slice = OutputSlice {
                    audio: self.buffer.slice(boundary as usize, event.offset as usize),
                    description: self.window.describe(Some(event.fade_type.as_str())),
                    master_title: self.window.master_title().to_string(),
                    master_index: self.window.master_index(),
                    audible: self.window.audible(),
                };
                if !self.push(slice) {
                    return false;
                }
                boundary = event.offset;
            }
        }
        true
    }

    /// Queue a slice, blocking while the channel is full.
    fn push(&mut self, slice: OutputSlice) -> bool {
        if !self.control.is_running() {
            debug!("Stop requested, producer ending");
            return false;
        }
        if self.sender.send(StreamItem::Slice(slice)).is_err() {
            debug!("Consumer gone, producer ending");
            return false;
        }

        self.slices_emitted += 1;
        if let Some(ready) = self.ready.take() {
            let _ = ready.send(());
        }
        true
    }
}
