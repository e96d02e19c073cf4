//! Track selection interface
//!
//! The mixer treats the selector as a deterministic oracle: it is asked once
//! per transition and its answer is never retried. A selector that cannot
//! continue returns [`Error::SelectorExhausted`], which ends the stream.

use beatmix_common::FadeType;
use tracing::debug;

use crate::error::{Error, Result};
use crate::song::Song;

/// Where the current master should hand over, and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterQueue {
    /// Downbeat index of the master where the next song comes in
    pub cue_out: usize,
    pub fade_type: FadeType,
    /// Longest fade-in (master downbeats) the master can accommodate
    pub max_fade_in_len: u32,
    /// Fade-out length in master downbeats
    pub fade_out_len: u32,
}

/// The song that follows the current master
#[derive(Debug)]
pub struct NextTransition {
    pub song: Box<dyn Song>,
    /// Downbeat index of the next song that lines up with the master's cue-out
    pub cue_next_in: usize,
    /// Possibly adjusted cue-out of the master
    pub cue_out: usize,
    /// Fade-in length in master downbeats
    pub fade_in_len: u32,
    /// Pitch shift in semitones
    pub semitone_offset: i32,
}

/// Chooses songs, cue points and fades
pub trait TrackSelector: Send {
    /// The song that opens the mix.
    fn first_song(&mut self) -> Result<Box<dyn Song>>;

    /// Pick the master's cue-out at or after downbeat `cue_in`.
    fn master_queue(
        &mut self,
        song: &dyn Song,
        cue_in: usize,
        prev_fade_type: FadeType,
    ) -> Result<MasterQueue>;

    /// Pick the song that follows `song` at `cue_out`.
    fn best_next_song(
        &mut self,
        song: &dyn Song,
        cue_out: usize,
        max_fade_in_len: u32,
        fade_out_len: u32,
        fade_type: FadeType,
    ) -> Result<NextTransition>;
}

/// Plays a fixed list of songs in order, wrapping around
///
/// Every master plays `phrase_len` downbeats past its entry before handing
/// over, fades use fixed lengths and the transition style rotates through
/// all fade types. Songs are cloned out of the list, so `S` is normally a
/// cheap unopened handle.
#[derive(Debug, Clone)]
pub struct SequentialSelector<S> {
    songs: Vec<S>,
    position: usize,
    phrase_len: usize,
    fade_in_len: u32,
    fade_out_len: u32,
    lookahead_downbeats: u32,
}

impl<S> SequentialSelector<S>
where
    S: Song + Clone + 'static,
{
    pub fn new(songs: Vec<S>) -> Self {
        Self {
            songs,
            position: 0,
            phrase_len: 32,
            fade_in_len: 8,
            fade_out_len: 8,
            lookahead_downbeats: 2,
        }
    }

    pub fn with_phrase_len(mut self, phrase_len: usize) -> Self {
        self.phrase_len = phrase_len;
        self
    }

    pub fn with_fades(mut self, fade_in_len: u32, fade_out_len: u32) -> Self {
        self.fade_in_len = fade_in_len;
        self.fade_out_len = fade_out_len;
        self
    }

    /// Downbeats the mixer reads past the cue-out beyond the fade itself.
    pub fn with_lookahead(mut self, lookahead_downbeats: u32) -> Self {
        self.lookahead_downbeats = lookahead_downbeats;
        self
    }

    fn take_next(&mut self) -> Result<S> {
        if self.songs.is_empty() {
            return Err(Error::SelectorExhausted("song list is empty".to_string()));
        }
        let song = self.songs[self.position % self.songs.len()].clone();
        self.position += 1;
        Ok(song)
    }

    fn following_fade_type(prev: FadeType) -> FadeType {
        match prev {
            FadeType::Chill => FadeType::Rolling,
            FadeType::Rolling => FadeType::DoubleDrop,
            FadeType::DoubleDrop => FadeType::Chill,
        }
    }
}

impl<S> TrackSelector for SequentialSelector<S>
where
    S: Song + Clone + 'static,
{
    fn first_song(&mut self) -> Result<Box<dyn Song>> {
        let mut song = self.take_next()?;
        song.open()?;
        Ok(Box::new(song))
    }

    fn master_queue(
        &mut self,
        song: &dyn Song,
        cue_in: usize,
        prev_fade_type: FadeType,
    ) -> Result<MasterQueue> {
        // Room needed after the cue-out: the fade plus the mixer's lookahead
        let tail = (self.fade_in_len + self.fade_out_len + self.lookahead_downbeats) as usize;
        let last_cue = song.downbeats().len().saturating_sub(tail + 1);

        if last_cue < cue_in {
            return Err(Error::SelectorExhausted(format!(
                "'{}' has no cue-out after downbeat {} ({} downbeats)",
                song.title(),
                cue_in,
                song.downbeats().len()
            )));
        }

        let cue_out = (cue_in + self.phrase_len).min(last_cue);
        let fade_type = Self::following_fade_type(prev_fade_type);
        debug!("Master '{}' hands over at downbeat {} ({})", song.title(), cue_out, fade_type);

        Ok(MasterQueue {
            cue_out,
            fade_type,
            max_fade_in_len: self.fade_in_len,
            fade_out_len: self.fade_out_len,
        })
    }

    fn best_next_song(
        &mut self,
        _song: &dyn Song,
        cue_out: usize,
        max_fade_in_len: u32,
        _fade_out_len: u32,
        _fade_type: FadeType,
    ) -> Result<NextTransition> {
        let mut next = self.take_next()?;
        next.open()?;
        let cue_next_in = next.segment_indices().first().copied().unwrap_or(0);

        Ok(NextTransition {
            song: Box::new(next),
            cue_next_in,
            cue_out,
            fade_in_len: self.fade_in_len.min(max_fade_in_len),
            semitone_offset: 0,
        })
    }
}
