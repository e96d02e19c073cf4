//! Annotated songs on disk
//!
//! A song on disk is an audio file (WAV, MP3, FLAC, Ogg Vorbis or AAC/M4A)
//! plus an annotation sidecar next to it,
//! `<file>.beats.json`, holding the tempo, beat and downbeat timestamps and
//! structural segment boundaries produced by offline analysis.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::audio::decode::{self, DecodedAudio};
use crate::audio::resampler::Resampler;
use crate::audio::AudioBuffer;
use crate::error::{Error, Result};
use crate::song::Song;

/// Contents of the annotation sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongAnnotations {
    /// Display title (defaults to the file stem)
    #[serde(default)]
    pub title: Option<String>,
    pub tempo: f64,
    #[serde(default)]
    pub beats: Vec<f64>,
    pub downbeats: Vec<f64>,
    #[serde(default)]
    pub segment_indices: Vec<usize>,
}

impl SongAnnotations {
    fn validate(&self, path: &Path) -> Result<()> {
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(Error::InvalidInput(format!(
                "{}: tempo must be positive, got {}",
                path.display(),
                self.tempo
            )));
        }
        if self.downbeats.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidInput(format!(
                "{}: downbeats are not ascending",
                path.display()
            )));
        }
        if self.segment_indices.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidInput(format!(
                "{}: segment indices are not ascending",
                path.display()
            )));
        }
        Ok(())
    }
}

/// Sidecar path for a song file
pub fn annotation_path(song_path: &Path) -> PathBuf {
    let mut name = song_path.as_os_str().to_os_string();
    name.push(".beats.json");
    PathBuf::from(name)
}

/// An audio file with its annotations
///
/// Audio is converted to `channels` channels at `sample_rate` when opened.
#[derive(Debug, Clone)]
pub struct FileSong {
    path: PathBuf,
    title: String,
    channels: usize,
    sample_rate: u32,
    annotations: Option<SongAnnotations>,
    audio: Option<AudioBuffer>,
}

impl FileSong {
    pub fn new(path: impl Into<PathBuf>, channels: usize, sample_rate: u32) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            title,
            channels: channels.max(1),
            sample_rate,
            annotations: None,
            audio: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.annotations.is_some()
    }

    fn read_audio(&self) -> Result<AudioBuffer> {
        let is_wav = self
            .path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        let DecodedAudio { audio, sample_rate } = if is_wav {
            read_wav(&self.path)?
        } else {
            decode::decode_file(&self.path)?
        };

        let mapped = remap_channels(audio, self.channels);
        Resampler::resample(&mapped, sample_rate, self.sample_rate)
    }
}

fn read_wav(path: &Path) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let source_channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    Ok(DecodedAudio {
        audio: AudioBuffer::from_interleaved(&interleaved, source_channels),
        sample_rate: spec.sample_rate,
    })
}

/// Fit `audio` to `channels` channels: mono is duplicated, surplus channels
/// are averaged down to mono or dropped for stereo.
fn remap_channels(audio: AudioBuffer, channels: usize) -> AudioBuffer {
    let source = audio.channel_count();
    if source == channels || source == 0 {
        return audio;
    }

    if channels == 1 {
        let len = audio.len();
        let mut mono = vec![0.0; len];
        for channel in audio.channels() {
            for (out, sample) in mono.iter_mut().zip(channel) {
                *out += sample / source as f32;
            }
        }
        return AudioBuffer::mono(mono);
    }

    let mut input = audio.into_channels();
    if source == 1 {
        let mono = input.remove(0);
        return AudioBuffer::from_channels(vec![mono; channels]);
    }
    input.truncate(channels);
    while input.len() < channels {
        let last = input[input.len() - 1].clone();
        input.push(last);
    }
    AudioBuffer::from_channels(input)
}

impl Song for FileSong {
    fn title(&self) -> &str {
        &self.title
    }

    fn open(&mut self) -> Result<()> {
        if self.annotations.is_some() {
            return Ok(());
        }

        let sidecar = annotation_path(&self.path);
        let text = fs::read_to_string(&sidecar)?;
        let annotations: SongAnnotations = serde_json::from_str(&text)?;
        annotations.validate(&sidecar)?;

        if let Some(title) = annotations.title.as_ref() {
            self.title = title.clone();
        }
        debug!(
            "Opened '{}': {:.2} BPM, {} downbeats",
            self.title,
            annotations.tempo,
            annotations.downbeats.len()
        );
        self.annotations = Some(annotations);
        Ok(())
    }

    fn close(&mut self) {
        self.annotations = None;
        self.audio = None;
    }

    fn open_audio(&mut self) -> Result<()> {
        if self.audio.is_none() {
            let audio = self.read_audio()?;
            debug!(
                "Loaded audio for '{}': {:.1}s",
                self.title,
                audio.duration_seconds(self.sample_rate)
            );
            self.audio = Some(audio);
        }
        Ok(())
    }

    fn close_audio(&mut self) {
        self.audio = None;
    }

    fn tempo(&self) -> f64 {
        self.annotations.as_ref().map(|a| a.tempo).unwrap_or(0.0)
    }

    fn downbeats(&self) -> &[f64] {
        self.annotations.as_ref().map(|a| a.downbeats.as_slice()).unwrap_or(&[])
    }

    fn beats(&self) -> &[f64] {
        self.annotations.as_ref().map(|a| a.beats.as_slice()).unwrap_or(&[])
    }

    fn segment_indices(&self) -> &[usize] {
        self.annotations
            .as_ref()
            .map(|a| a.segment_indices.as_slice())
            .unwrap_or(&[])
    }

    fn audio(&self) -> Option<&AudioBuffer> {
        self.audio.as_ref()
    }
}

/// Annotated songs collected from one or more directories
#[derive(Debug, Default)]
pub struct SongLibrary {
    channels: usize,
    sample_rate: u32,
    directories: HashSet<PathBuf>,
    songs: Vec<FileSong>,
}

impl SongLibrary {
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            ..Default::default()
        }
    }

    /// Add every annotated audio file in `dir`, in file name order.
    ///
    /// Files without a sidecar are skipped with a warning; a directory that
    /// was already loaded is skipped entirely. Returns the number of songs
    /// added.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        let canonical = fs::canonicalize(dir)?;
        if !self.directories.insert(canonical.clone()) {
            info!("{} already loaded, skipping", dir.display());
            return Ok(0);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&canonical)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && decode::is_supported(p))
            .collect();
        paths.sort();

        let mut added = 0;
        for path in paths {
            if !annotation_path(&path).is_file() {
                warn!("{} has no annotations, skipping", path.display());
                continue;
            }
            self.songs.push(FileSong::new(path, self.channels, self.sample_rate));
            added += 1;
        }

        info!("Loaded {} annotated songs from {}", added, dir.display());
        Ok(added)
    }

    pub fn songs(&self) -> &[FileSong] {
        &self.songs
    }

    pub fn into_songs(self) -> Vec<FileSong> {
        self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
