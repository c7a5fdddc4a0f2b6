//! # musan Common Library
//!
//! Shared code for the musan services:
//! - Error type
//! - Configuration loading and resolution

pub mod config;
pub mod error;

pub use config::{AnalysisConfig, ServerConfig};
pub use error::{Error, Result};
