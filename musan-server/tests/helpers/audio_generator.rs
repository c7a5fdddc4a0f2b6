//! Audio Test Fixture Generator
//!
//! WAV fixtures written with hound, optionally tagged with lofty

use hound::{SampleFormat, WavSpec, WavWriter};
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::Picture;
use lofty::tag::{Accessor, Tag, TagType};
use std::path::Path;

/// Minimal PNG signature + IHDR length, enough for MIME detection
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00,
];

/// Write a 16-bit sine-wave WAV (same signal on every channel)
pub fn generate_sine_wav(
    path: &Path,
    frequency: f32,
    duration_secs: f32,
    channels: u16,
) -> anyhow::Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let num_frames = (duration_secs * spec.sample_rate as f32) as usize;

    for i in 0..num_frames {
        let t = i as f32 / spec.sample_rate as f32;
        let sample = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5;
        let sample_i16 = (sample * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample_i16)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Write a mono WAV of decaying 1 kHz clicks at `bpm`
pub fn generate_click_wav(path: &Path, bpm: f32, duration_secs: f32) -> anyhow::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let sr = spec.sample_rate as f32;
    let period = (60.0 / bpm * sr) as usize;
    let click_len = spec.sample_rate as usize / 50;

    for i in 0..(duration_secs * sr) as usize {
        let pos = i % period;
        let sample = if pos < click_len {
            let t = pos as f32 / sr;
            0.8 * (-t * 200.0).exp() * (2.0 * std::f32::consts::PI * 1000.0 * t).sin()
        } else {
            0.0
        };
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }

    writer.finalize()?;
    Ok(())
}

/// Tags to embed in a fixture
#[derive(Debug, Default)]
pub struct TagSpec<'a> {
    pub title: Option<&'a str>,
    pub artist: Option<&'a str>,
    pub album: Option<&'a str>,
    pub genre: Option<&'a str>,
    pub picture: Option<&'a [u8]>,
}

/// Add an ID3v2 tag to an existing audio file
pub fn tag_file(path: &Path, spec: &TagSpec) -> anyhow::Result<()> {
    let mut tagged_file = lofty::probe::Probe::open(path)?.read()?;

    let mut tag = Tag::new(TagType::Id3v2);
    if let Some(title) = spec.title {
        tag.set_title(title.to_string());
    }
    if let Some(artist) = spec.artist {
        tag.set_artist(artist.to_string());
    }
    if let Some(album) = spec.album {
        tag.set_album(album.to_string());
    }
    if let Some(genre) = spec.genre {
        tag.set_genre(genre.to_string());
    }
    if let Some(bytes) = spec.picture {
        let mut reader = std::io::Cursor::new(bytes.to_vec());
        tag.push_picture(Picture::from_reader(&mut reader)?);
    }

    tagged_file.insert_tag(tag);
    tagged_file.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

/// Append a raw chunk to a RIFF file and fix up the RIFF size field
///
/// Chunks after `data` are invisible to the decoder but still parsed by tag
/// readers.
pub fn append_riff_chunk(path: &Path, id: &[u8; 4], data: &[u8]) -> anyhow::Result<()> {
    let mut bytes = std::fs::read(path)?;
    anyhow::ensure!(bytes.starts_with(b"RIFF"), "not a RIFF file: {}", path.display());

    bytes.extend_from_slice(id);
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(data);
    if data.len() % 2 == 1 {
        bytes.push(0);
    }

    let riff_size = (bytes.len() - 8) as u32;
    bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());

    std::fs::write(path, bytes)?;
    Ok(())
}
