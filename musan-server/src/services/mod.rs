//! Request pipeline services
//!
//! Upload → {metadata, decode → analyze}; each step is independent of HTTP.

pub mod audio_decoder;
pub mod feature_analyzer;
pub mod metadata_extractor;
pub mod upload_receiver;

pub use audio_decoder::{decode_audio_file, DecodeError, DecodedAudio};
pub use feature_analyzer::FeatureAnalyzer;
pub use metadata_extractor::{MetadataError, MetadataExtractor};
pub use upload_receiver::{UploadError, UploadReceiver, UploadedFile};
