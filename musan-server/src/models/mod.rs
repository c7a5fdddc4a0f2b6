//! Data models for musan-server
//!
//! Per-request records; nothing here outlives one request/response cycle.

pub mod analysis;

pub use analysis::{AnalysisResponse, AnalysisResult, TrackMetadata};
