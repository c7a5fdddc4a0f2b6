//! Audio decoding
//!
//! **Purpose:** Decode an uploaded file to the f32 sample sequence the feature
//! analyzer consumes.
//!
//! Uses symphonia for format-agnostic decoding (MP3, FLAC, AAC, WAV, OGG, ...).
//!
//! **Known simplification:** only the first channel is kept. Multi-channel
//! audio is *truncated* to channel 0, not averaged; key/tempo results depend
//! on this, so it must not be turned into a true downmix.

use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;
use tracing::{debug, warn};

/// Audio decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// File could not be opened or read
    #[error("Failed to open audio file: {0}")]
    Open(#[from] std::io::Error),

    /// Container format not recognised
    #[error("Unrecognized audio container: {0}")]
    Probe(String),

    /// Container holds no decodable audio track
    #[error("No audio track found in file")]
    NoTrack,

    /// Track does not declare a sample rate
    #[error("Sample rate unknown")]
    UnknownSampleRate,

    /// No decoder available for the track codec
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Stream failed mid-way
    #[error("Corrupt audio stream: {0}")]
    Corrupt(String),

    /// Decoding finished without producing a single sample
    #[error("No audio samples could be decoded")]
    Empty,
}

/// Decoded single-channel audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Channel 0 samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
    /// Duration in seconds
    pub duration_seconds: f64,
}

/// Decode an audio file, keeping only its first channel
///
/// **Algorithm:**
/// 1. Open file and probe format using symphonia (extension used as a hint)
/// 2. Find the first track with a real codec
/// 3. Decode all packets of that track
/// 4. Append channel 0 of every decoded buffer, converted to f32
///
/// Packets that fail with a recoverable decode error are skipped and logged.
///
/// # Errors
/// * File I/O errors
/// * Unsupported container or codec
/// * Corrupt audio data
/// * Zero samples decoded
pub fn decode_audio_file(file_path: &Path) -> Result<DecodedAudio, DecodeError> {
    debug!(path = %file_path.display(), "Decoding audio file");

    let file = std::fs::File::open(file_path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedCodec(e.to_string()))?;

    debug!(
        path = %file_path.display(),
        sample_rate,
        channels,
        "Audio stream info"
    );

    let mut samples: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if channels == 0 {
                    channels = decoded.spec().channels.count();
                }
                append_first_channel(&decoded, &mut samples);
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                skipped_packets += 1;
                warn!(path = %file_path.display(), error = msg, "Skipping undecodable packet");
            }
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    let duration_seconds = samples.len() as f64 / sample_rate as f64;

    debug!(
        path = %file_path.display(),
        total_samples = samples.len(),
        skipped_packets,
        duration_seconds = format!("{:.2}", duration_seconds),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
        duration_seconds,
    })
}

/// Append channel 0 of a decoded buffer as f32
fn append_first_channel(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => copy_first_channel(buf, out),
        AudioBufferRef::U16(buf) => copy_first_channel(buf, out),
        AudioBufferRef::U24(buf) => copy_first_channel(buf, out),
        AudioBufferRef::U32(buf) => copy_first_channel(buf, out),
        AudioBufferRef::S8(buf) => copy_first_channel(buf, out),
        AudioBufferRef::S16(buf) => copy_first_channel(buf, out),
        AudioBufferRef::S24(buf) => copy_first_channel(buf, out),
        AudioBufferRef::S32(buf) => copy_first_channel(buf, out),
        AudioBufferRef::F32(buf) => copy_first_channel(buf, out),
        AudioBufferRef::F64(buf) => copy_first_channel(buf, out),
    }
}

fn copy_first_channel<S>(buf: &AudioBuffer<S>, out: &mut Vec<f32>)
where
    S: Sample,
    f32: FromSample<S>,
{
    if buf.spec().channels.count() == 0 {
        return;
    }
    out.extend(buf.chan(0).iter().map(|&s| f32::from_sample(s)));
}
