//! Test Helper Utilities
//!
//! Shared utilities for testing musan-server

#![allow(dead_code)]

pub mod audio_generator;
pub mod multipart;

pub use audio_generator::{
    append_riff_chunk, generate_click_wav, generate_sine_wav, tag_file, TagSpec,
};
pub use multipart::{analyze_request, MultipartBody};
