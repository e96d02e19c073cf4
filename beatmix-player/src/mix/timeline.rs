//! Transition timeline
//!
//! Pending transition events with offsets relative to the start of the
//! current mix buffer. After every cycle the consumed prefix is subtracted
//! from all offsets and already-fired events are dropped, so the timeline
//! never holds more than the current and the next transition.

use beatmix_common::FadeType;
use std::fmt;
use tracing::trace;

use super::{FadeDescriptor, MixParams};
use crate::error::Result;
use crate::song::Song;

/// What happens at a transition event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// A new song becomes audible
    In,
    /// The new song becomes master
    Switch,
    /// The oldest audible song goes silent
    Out,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::In => write!(f, "in"),
            TransitionKind::Switch => write!(f, "switch"),
            TransitionKind::Out => write!(f, "out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    /// Sample offset from the start of the current mix buffer
    pub offset: i64,
    pub kind: TransitionKind,
    pub fade_type: FadeType,
}

/// Offsets of the three events of one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOffsets {
    pub in_offset: i64,
    pub switch_offset: i64,
    pub out_offset: i64,
}

impl TransitionOffsets {
    /// Compute where a transition out of `master` lands in the mix buffer.
    ///
    /// `anchor_sample` is the master's native sample at which the current
    /// buffer starts; `cue_out` indexes the master's downbeats. Each offset is
    /// truncated toward zero independently.
    pub fn compute(
        params: &MixParams,
        master: &dyn Song,
        anchor_sample: i64,
        cue_out: usize,
        fade: &FadeDescriptor,
    ) -> Result<Self> {
        let ratio = params.tempo_ratio(master.tempo());
        let spd = params.samples_per_downbeat();
        let cue_sample = master.downbeat(cue_out)? * params.sample_rate as f64;
        let base = ratio * (cue_sample - anchor_sample as f64);

        Ok(Self {
            in_offset: base as i64,
            switch_offset: (base + fade.fade_in_len as f64 * spd) as i64,
            out_offset: (base + fade.total_len() as f64 * spd) as i64,
        })
    }
}

/// Ordered pending transition events
#[derive(Debug, Clone, Default)]
pub struct TransitionTimeline {
    events: Vec<TransitionEvent>,
}

impl TransitionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one event after every event with an offset less than or equal
    /// to its own, keeping equal offsets in insertion order.
    pub fn insert(&mut self, event: TransitionEvent) {
        let position = self.events.partition_point(|e| e.offset <= event.offset);
        self.events.insert(position, event);
    }

    /// Insert the `in`, `switch` and `out` events of one transition.
    pub fn schedule(&mut self, offsets: TransitionOffsets, fade_type: FadeType) {
        trace!(
            "Scheduling {} transition: in={} switch={} out={}",
            fade_type,
            offsets.in_offset,
            offsets.switch_offset,
            offsets.out_offset
        );
        for (offset, kind) in [
            (offsets.in_offset, TransitionKind::In),
            (offsets.switch_offset, TransitionKind::Switch),
            (offsets.out_offset, TransitionKind::Out),
        ] {
            self.insert(TransitionEvent {
                offset,
                kind,
                fade_type,
            });
        }
    }

    /// Shift the origin forward by `consumed` samples and forget every event
    /// that has already fired.
    pub fn rebase(&mut self, consumed: i64) {
        self.events.retain_mut(|event| {
            event.offset -= consumed;
            event.offset > 0
        });
    }

    /// Events at or before `cut_point`, in order.
    pub fn due(&self, cut_point: i64) -> impl Iterator<Item = &TransitionEvent> {
        self.events.iter().take_while(move |e| e.offset <= cut_point)
    }

    pub fn events(&self) -> &[TransitionEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
