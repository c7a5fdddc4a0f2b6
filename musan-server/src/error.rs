//! Error types for musan-server
//!
//! Every failure reaches the client as `{"error": "<message>"}`. Upload
//! count violations are 400; everything else is 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::dsp::AnalysisError;
use crate::services::{DecodeError, MetadataError, UploadError};

/// Appended to decode failures so callers know to re-encode
pub const FORMAT_HINT: &str = "Please select audio file with different format";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is not parseable multipart form data
    #[error("Failed to parse upload form: {0}")]
    FormParse(String),

    /// No file part in the form (400)
    #[error("No file was uploaded; submit exactly one file")]
    MissingFile,

    /// More than one file part in the form (400)
    #[error("Multiple files were uploaded; submit exactly one file")]
    MultipleFiles,

    /// Tags could not be read at all
    #[error("Error reading audio file metadata: {0}")]
    MetadataRead(#[from] MetadataError),

    /// Audio could not be decoded
    #[error("{0}: {}", FORMAT_HINT)]
    AudioDecode(#[from] DecodeError),

    /// Decoded samples unusable for analysis
    #[error("Audio analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// Request exceeded its time budget
    #[error("Analysis timed out after {0} seconds")]
    Timeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::FormParse(msg) => ApiError::FormParse(msg),
            UploadError::MissingFile => ApiError::MissingFile,
            UploadError::MultipleFiles => ApiError::MultipleFiles,
            UploadError::Io(e) => ApiError::Io(e),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFile | ApiError::MultipleFiles => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, "Request failed");
        } else {
            tracing::warn!(error = %message, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
