//! Producer-side integration tests: scheduling, slicing and crossfades
//!
//! Uses a 1 kHz grid at 120 BPM so one downbeat is exactly 2000 samples.
//! With the selector below every cycle cuts the buffer after 10 downbeats
//! (20000 samples) and fades over 2 + 2 downbeats.

mod helpers;

use beatmix_common::{CurvePair, CurvePolicy, FadeCurve, FadeType};
use beatmix_player::error::Error;
use beatmix_player::mix::{
    FadeDescriptor, MixParams, MixProducer, MixSources, OutputSlice, ProducerExit, ProducerState,
    StreamItem, TransitionOffsets,
};
use beatmix_player::playback::ControlPlane;
use beatmix_player::SequentialSelector;
use crossbeam_channel::{bounded, Receiver};
use helpers::{wait_until, ResizeStretcher, SyntheticSong};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const RATE: u32 = 1000;
const CYCLE: usize = 20000;

fn params() -> MixParams {
    MixParams {
        sample_rate: RATE,
        master_tempo: 120.0,
        beats_per_downbeat: 4,
        initial_fade_in_len: 2,
        lookahead_downbeats: 2,
    }
}

fn song(title: &str, level: f32) -> SyntheticSong {
    SyntheticSong::new(title, 120.0, 32, RATE).with_level(level)
}

fn spawn_producer(
    songs: Vec<SyntheticSong>,
    capacity: usize,
) -> (Receiver<StreamItem>, Arc<ControlPlane>, JoinHandle<ProducerExit>) {
    spawn_producer_with_phrase(songs, capacity, 8)
}

fn spawn_producer_with_phrase(
    songs: Vec<SyntheticSong>,
    capacity: usize,
    phrase_len: usize,
) -> (Receiver<StreamItem>, Arc<ControlPlane>, JoinHandle<ProducerExit>) {
    let control = Arc::new(ControlPlane::new());
    control.set_running(true);

    let selector = SequentialSelector::new(songs)
        .with_phrase_len(phrase_len)
        .with_fades(2, 2)
        .with_lookahead(2);
    let sources = MixSources {
        selector: Box::new(selector),
        stretcher: Box::new(ResizeStretcher),
    };
    let (sender, receiver) = bounded(capacity);
    let producer = MixProducer::new(
        params(),
        CurvePolicy::uniform(CurvePair::matched(FadeCurve::Linear)),
        sources,
        Arc::clone(&control),
        sender,
    );

    let handle = thread::spawn(move || producer.run());
    (receiver, control, handle)
}

fn take_slices(receiver: &Receiver<StreamItem>, count: usize) -> Vec<OutputSlice> {
    (0..count)
        .map(|_| match receiver.recv_timeout(Duration::from_secs(5)) {
            Ok(StreamItem::Slice(slice)) => slice,
            other => panic!("expected a slice, got {:?}", other.map(|_| ())),
        })
        .collect()
}

fn assert_all_close(samples: &[f32], expected: f32) {
    for (i, sample) in samples.iter().enumerate() {
        assert!(
            (sample - expected).abs() < 1e-6,
            "sample {} is {}, expected {}",
            i,
            sample,
            expected
        );
    }
}

#[test]
fn test_fade_in_length_between_in_and_switch() {
    let params = MixParams {
        sample_rate: 44100,
        master_tempo: 120.0,
        ..MixParams::default()
    };
    let master = SyntheticSong::new("alpha", 120.0, 64, 44100);
    let fade = FadeDescriptor {
        fade_in_len: 8,
        fade_out_len: 8,
        fade_type: FadeType::Chill,
    };

    let offsets = TransitionOffsets::compute(&params, &master, 0, 32, &fade).unwrap();

    assert_eq!(offsets.in_offset, 32 * 88200);
    assert_eq!(offsets.switch_offset - offsets.in_offset, 8 * 88200);
    assert_eq!(offsets.out_offset - offsets.switch_offset, 8 * 88200);
}

#[test]
fn test_first_slice_plays_first_song_alone() {
    let (receiver, control, handle) = spawn_producer(vec![song("alpha", 0.25), song("beta", 0.5)], 8);

    let first = take_slices(&receiver, 1).remove(0);
    control.set_running(false);
    drop(receiver);
    let exit = handle.join().unwrap();

    assert_eq!(first.audio.len(), CYCLE);
    assert_eq!(first.audio.channel_count(), 2);
    assert_eq!(first.description, "Now playing:\nALPHA\n");
    assert_eq!(first.master_title, "alpha");
    assert_eq!(first.master_index, 0);
    assert_all_close(first.audio.channel(0), 0.25);
    assert!(exit.outcome.is_ok());
}

#[test]
fn test_transition_slices() {
    let (receiver, control, handle) = spawn_producer(
        vec![song("alpha", 0.25), song("beta", 0.5), song("gamma", 0.75)],
        8,
    );

    let slices = take_slices(&receiver, 4);
    control.set_running(false);
    drop(receiver);
    handle.join().unwrap();

    let audible: Vec<usize> = slices.iter().map(|s| s.audible).collect();
    assert_eq!(audible, vec![1, 2, 2, 1]);

    // Fade-in half: both audible, alpha still master
    assert_eq!(slices[1].audio.len(), 4000);
    assert_eq!(slices[1].description, "Now playing:\nALPHA\nbeta\n[rolling]");
    assert_eq!(slices[1].master_index, 0);
    let blend = slices[1].audio.channel(0);
    assert!((blend[0] - 0.25).abs() < 1e-6);
    assert!(blend.iter().all(|s| (0.25..=0.5).contains(s)));

    // Fade-out half: beta is master
    assert_eq!(slices[2].audio.len(), 4000);
    assert_eq!(slices[2].description, "Now playing:\nalpha\nBETA\n[rolling]");
    assert_eq!(slices[2].master_title, "beta");
    assert!((slices[2].audio.channel(0)[0] - 0.375).abs() < 1e-6);

    // After the fade only beta is heard
    assert_eq!(slices[3].audio.len(), CYCLE - 8000);
    assert_eq!(slices[3].description, "Now playing:\nBETA\n");
    assert_eq!(slices[3].master_index, 1);
    assert_all_close(slices[3].audio.channel(1), 0.5);
}

#[test]
fn test_short_phrases_overlap_three_songs() {
    // One-downbeat phrases bring the next song in before the last fade ends
    let (receiver, control, handle) = spawn_producer_with_phrase(
        vec![song("alpha", 0.1), song("beta", 0.2), song("gamma", 0.3)],
        32,
        1,
    );

    let slices = take_slices(&receiver, 20);
    control.set_running(false);
    drop(receiver);
    let exit = handle.join().unwrap();
    assert!(exit.outcome.is_ok());

    for slice in &slices {
        assert!(slice.audible >= 1, "{:?}", slice.description);
        let titles = slice
            .description
            .lines()
            .skip(1)
            .filter(|l| !l.starts_with('['))
            .count();
        assert_eq!(titles, slice.audible, "{:?}", slice.description);
    }
    assert!(slices.iter().any(|s| s.audible == 3));
}

#[test]
fn test_producer_state_follows_lifecycle() {
    let (receiver, control, handle) = spawn_producer(vec![song("alpha", 0.2), song("beta", 0.4)], 64);

    take_slices(&receiver, 1);
    assert!(wait_until(Duration::from_secs(5), || {
        control.producer_state() == ProducerState::Steady
    }));

    control.set_running(false);
    while let Ok(item) = receiver.recv_timeout(Duration::from_secs(5)) {
        if matches!(item, StreamItem::EndOfStream) {
            break;
        }
    }
    handle.join().unwrap();

    assert_eq!(control.producer_state(), ProducerState::Stopped);
}

#[test]
fn test_emitted_length_matches_cut_points() {
    let (receiver, control, handle) = spawn_producer(vec![song("alpha", 0.2), song("beta", 0.4)], 8);

    // One slice for the first cycle, three per cycle after it
    let cycles = 4;
    let slices = take_slices(&receiver, 1 + 3 * (cycles - 1));
    control.set_running(false);
    drop(receiver);
    let exit = handle.join().unwrap();

    let total: usize = slices.iter().map(|s| s.audio.len()).sum();
    assert_eq!(total, cycles * CYCLE);
    assert!(exit.slices_emitted >= slices.len());
}

#[test]
fn test_master_index_and_descriptions() {
    let (receiver, control, handle) = spawn_producer(
        vec![song("alpha", 0.1), song("beta", 0.2), song("gamma", 0.3)],
        8,
    );

    let slices = take_slices(&receiver, 13);
    control.set_running(false);
    drop(receiver);
    handle.join().unwrap();

    for pair in slices.windows(2) {
        let step = pair[1].master_index - pair[0].master_index;
        assert!(step <= 1, "master index jumped by {}", step);
    }
    assert_eq!(slices.last().unwrap().master_index, 4);

    for slice in &slices {
        let lines: Vec<&str> = slice.description.lines().collect();
        assert_eq!(lines[0], "Now playing:");
        let titles: Vec<&str> = lines[1..].iter().copied().filter(|l| !l.starts_with('[')).collect();
        assert!((1..=2).contains(&titles.len()), "{:?}", slice.description);
        assert_eq!(lines.len(), 1 + titles.len() + usize::from(titles.len() > 1));
        assert_eq!(
            titles.iter().filter(|t| **t == slice.master_title.to_uppercase()).count(),
            1
        );
    }
}

#[test]
fn test_mixed_tempos_land_on_master_grid() {
    let songs = vec![
        SyntheticSong::new("fast", 150.0, 32, RATE),
        SyntheticSong::new("slow", 100.0, 32, RATE),
    ];
    let (receiver, control, handle) = spawn_producer(songs, 8);

    let slices = take_slices(&receiver, 7);
    control.set_running(false);
    drop(receiver);
    handle.join().unwrap();

    // Ten downbeats of either song stretch to ten master downbeats
    let first_cycle = slices[0].audio.len() as i64;
    let second_cycle: usize = slices[1..4].iter().map(|s| s.audio.len()).sum();
    let third_cycle: usize = slices[4..7].iter().map(|s| s.audio.len()).sum();
    assert!((first_cycle - CYCLE as i64).abs() <= 1);
    assert!((second_cycle as i64 - CYCLE as i64).abs() <= 2);
    assert!((third_cycle as i64 - CYCLE as i64).abs() <= 2);
}

#[test]
fn test_full_queue_blocks_producer() {
    let (receiver, _control, handle) = spawn_producer(vec![song("alpha", 0.2), song("beta", 0.4)], 2);

    assert!(wait_until(Duration::from_secs(5), || receiver.len() == 2));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(receiver.len(), 2);
    assert!(!handle.is_finished());

    // Disconnecting wakes the blocked send
    drop(receiver);
    let exit = handle.join().unwrap();
    assert!(exit.outcome.is_ok());
    assert_eq!(exit.slices_emitted, 2);
}

#[test]
fn test_stop_flag_ends_producer() {
    let (receiver, control, handle) = spawn_producer(vec![song("alpha", 0.2), song("beta", 0.4)], 64);

    take_slices(&receiver, 2);
    control.set_running(false);
    // Drain so a blocked send can complete and observe the flag
    while let Ok(item) = receiver.recv_timeout(Duration::from_secs(5)) {
        if matches!(item, StreamItem::EndOfStream) {
            break;
        }
    }

    let exit = handle.join().unwrap();
    assert!(exit.outcome.is_ok());
}

#[test]
fn test_empty_library_ends_with_error() {
    let (receiver, _control, handle) = spawn_producer(Vec::new(), 4);

    let exit = handle.join().unwrap();
    assert!(matches!(exit.outcome, Err(Error::SelectorExhausted(_))));
    assert_eq!(exit.slices_emitted, 0);
    assert!(matches!(receiver.try_recv(), Ok(StreamItem::EndOfStream)));
}

#[test]
fn test_short_song_ends_stream_after_pending_audio() {
    let songs = vec![song("alpha", 0.2), SyntheticSong::new("stub", 120.0, 5, RATE)];
    let (receiver, _control, handle) = spawn_producer(songs, 4);

    let exit = handle.join().unwrap();
    assert!(matches!(exit.outcome, Err(Error::SelectorExhausted(_))));
    assert_eq!(exit.slices_emitted, 1);

    let items: Vec<StreamItem> = receiver.try_iter().collect();
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], StreamItem::Slice(s) if s.master_title == "alpha"));
    assert!(matches!(items[1], StreamItem::EndOfStream));
}
