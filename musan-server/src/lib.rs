//! musan-server library interface
//!
//! Exposes the router and pipeline services for integration testing.

pub mod api;
pub mod dsp;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use musan_common::ServerConfig;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{FeatureAnalyzer, MetadataExtractor, UploadReceiver};

/// Application state shared across handlers
///
/// Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Feature analysis engine, built once at startup
    pub analyzer: Arc<FeatureAnalyzer>,
    /// Multipart upload receiver (temp file directory)
    pub receiver: Arc<UploadReceiver>,
    /// Tag reader
    pub metadata: MetadataExtractor,
    /// Resolved server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build state, initialising the analysis engine
    pub fn new(config: ServerConfig) -> Self {
        let analyzer = Arc::new(FeatureAnalyzer::new(&config.analysis));
        let receiver = Arc::new(UploadReceiver::new(config.upload_dir()));

        Self {
            analyzer,
            receiver,
            metadata: MetadataExtractor::new(),
            config: Arc::new(config),
        }
    }
}

/// Build application router
///
/// Any origin may call the API (no credentials, no allow-list).
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(api::analyze_routes(max_upload_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
