//! Audio metadata extraction service
//!
//! Extracts embedded tags using lofty:
//! - Title, artist, album, genre
//! - Cover art, as a `data:` URI
//!
//! Two failure channels: an unreadable file (or one lofty cannot identify) is
//! an error; a readable file whose tag carries no picture just leaves
//! `album_art` empty.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::Tag;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::TrackMetadata;

/// MIME type used when picture bytes match no known image signature
const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

/// Metadata extraction errors
#[derive(Debug, Error)]
pub enum MetadataError {
    /// File could not be opened
    #[error("Failed to open file: {0}")]
    Open(String),

    /// No tag container lofty could read
    #[error("Failed to read tags: {0}")]
    ReadError(String),
}

/// Metadata extractor service
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Create new metadata extractor
    pub fn new() -> Self {
        Self
    }

    /// Extract tag metadata from an audio file
    ///
    /// Uses the primary tag, falling back to the first tag present. A file
    /// with no tag at all yields an empty [`TrackMetadata`].
    pub fn extract(&self, file_path: &Path) -> Result<TrackMetadata, MetadataError> {
        let tagged_file = Probe::open(file_path)
            .map_err(|e| MetadataError::Open(e.to_string()))?
            .guess_file_type()
            .map_err(|e| MetadataError::ReadError(e.to_string()))?
            .read()
            .map_err(|e| MetadataError::ReadError(e.to_string()))?;

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            debug!(file = %file_path.display(), "No tags found in audio file");
            return Ok(TrackMetadata::default());
        };

        let mut metadata = TrackMetadata {
            title: tag.title().map(|s| s.to_string()),
            artist: tag.artist().map(|s| s.to_string()),
            album: tag.album().map(|s| s.to_string()),
            genre: tag.genre().map(|s| s.to_string()),
            album_art: None,
        };

        match cover_picture(tag) {
            Some(picture) => metadata.album_art = Some(picture_data_uri(picture)),
            None => warn!(file = %file_path.display(), "No album artwork found in file"),
        }

        debug!(
            file = %file_path.display(),
            title = ?metadata.title,
            artist = ?metadata.artist,
            has_artwork = metadata.album_art.is_some(),
            "Extracted metadata"
        );

        Ok(metadata)
    }
}

/// Front cover if present, otherwise the first picture
fn cover_picture(tag: &Tag) -> Option<&Picture> {
    let pictures = tag.pictures();
    pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
        .filter(|p| !p.data().is_empty())
}

/// Encode a picture as `data:<mime>;base64,<payload>`
fn picture_data_uri(picture: &Picture) -> String {
    image_data_uri(picture.data())
}

/// Encode image bytes as a data URI, sniffing the MIME type from content
pub fn image_data_uri(data: &[u8]) -> String {
    let mime = infer::get(data)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or(FALLBACK_IMAGE_MIME);

    format!("data:{};base64,{}", mime, BASE64.encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_extract_nonexistent_file() {
        let extractor = MetadataExtractor::new();
        let result = extractor.extract(Path::new("/nonexistent/file.mp3"));
        assert!(matches!(result, Err(MetadataError::Open(_))));
    }

    #[test]
    fn test_extract_zero_byte_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        assert!(MetadataExtractor::new().extract(&path).is_err());
    }

    #[test]
    fn test_corrupt_id3_chunk_is_read_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad-tag.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..800 {
            writer.write_sample((i % 100) as i16 * 100).unwrap();
        }
        writer.finalize().unwrap();

        // `ID3 ` chunk whose body is not an ID3v2 tag
        let junk = b"NOT-AN-ID3-HEADER!";
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(b"ID3 ");
        bytes.extend_from_slice(&(junk.len() as u32).to_le_bytes());
        bytes.extend_from_slice(junk);
        let riff_size = (bytes.len() - 8) as u32;
        bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();

        let result = MetadataExtractor::new().extract(&path);
        assert!(matches!(result, Err(MetadataError::ReadError(_))), "got {result:?}");
    }

    #[test]
    fn test_image_data_uri_sniffs_png() {
        let uri = image_data_uri(PNG_MAGIC);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(uri, format!("data:image/png;base64,{}", BASE64.encode(PNG_MAGIC)));
    }

    #[test]
    fn test_image_data_uri_falls_back_to_jpeg() {
        let uri = image_data_uri(b"not an image signature");
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }
}
