//! Analysis data structures (POST /analyze)

use serde::{Deserialize, Serialize};

use crate::dsp::Mode;

/// Embedded tag metadata
///
/// Every field is independently optional. `None` text fields serialize as
/// `null`; missing artwork omits `metaAlbumArt` entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    #[serde(rename = "metaTitle", default)]
    pub title: Option<String>,

    #[serde(rename = "metaArtist", default)]
    pub artist: Option<String>,

    #[serde(rename = "metaAlbum", default)]
    pub album: Option<String>,

    #[serde(rename = "metaGenre", default)]
    pub genre: Option<String>,

    /// `data:<mime>;base64,<payload>`
    #[serde(
        rename = "metaAlbumArt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art: Option<String>,
}

/// Key/mode/tempo computed from the decoded samples
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Tonic pitch class, e.g. `"C#"`
    pub key: String,
    pub mode: Mode,
    /// Beats per minute (> 0)
    pub bpm: f32,
}

/// Response body for a successful analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(rename = "keySig")]
    pub key_sig: String,

    pub mode: Mode,

    pub bpm: f32,

    #[serde(rename = "metaData")]
    pub meta_data: TrackMetadata,
}

impl AnalysisResponse {
    /// Merge analysis output and tag metadata, values unchanged
    pub fn assemble(result: AnalysisResult, metadata: TrackMetadata) -> Self {
        Self {
            key_sig: result.key,
            mode: result.mode,
            bpm: result.bpm,
            meta_data: metadata,
        }
    }
}
