//! Compressed audio decoding using symphonia
//!
//! Handles MP3, FLAC, AAC/M4A and Ogg Vorbis (plus anything else the
//! enabled symphonia features can read). Output keeps the file's own
//! channel count and sample rate; the loader converts afterwards.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio::AudioBuffer;
use crate::error::{Error, Result};

/// File extensions the song library picks up
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a", "aac"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Audio at the file's native format
#[derive(Debug)]
pub struct DecodedAudio {
    pub audio: AudioBuffer,
    pub sample_rate: u32,
}

/// Decode the default track of `path` in full.
///
/// Packets that fail to decode are skipped with a warning; a file that
/// cannot be recognised or has no decodable track is a [`Error::Decode`].
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error(path, e))?;
    let mut format = detected.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode(format!("{}: no audio track found", path.display())))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, e))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count());
    let mut interleaved: Vec<f32> = Vec::new();
    let mut skipped = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error(path, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                skipped += 1;
                warn!("{}: skipping undecodable packet: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(decode_error(path, e)),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(samples.samples());
    }

    let (Some(sample_rate), Some(channels)) = (sample_rate, channels) else {
        return Err(Error::Decode(format!("{}: no decodable audio", path.display())));
    };
    if interleaved.is_empty() {
        return Err(Error::Decode(format!("{}: no decodable audio", path.display())));
    }

    let audio = AudioBuffer::from_interleaved(&interleaved, channels.max(1));
    debug!(
        "Decoded {}: {} frames, {} channels at {} Hz ({} packets skipped)",
        path.display(),
        audio.len(),
        channels,
        sample_rate,
        skipped
    );
    Ok(DecodedAudio { audio, sample_rate })
}

fn decode_error(path: &Path, e: SymphoniaError) -> Error {
    Error::Decode(format!("{}: {}", path.display(), e))
}
