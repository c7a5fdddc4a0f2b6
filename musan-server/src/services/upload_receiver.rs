//! Upload receiver
//!
//! Streams the single file part of a multipart form into a temp file. The
//! returned [`UploadedFile`] owns that temp file and deletes it on drop, so
//! every exit path of a request (success, error, timeout) cleans up.

use axum::extract::Multipart;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Longest file extension carried over to the temp file name
const MAX_EXTENSION_LEN: usize = 10;

/// Upload errors
#[derive(Debug, Error)]
pub enum UploadError {
    /// Body is not valid multipart form data
    #[error("{0}")]
    FormParse(String),

    /// No part carried a file
    #[error("No file was uploaded; submit exactly one file")]
    MissingFile,

    /// More than one part carried a file
    #[error("Multiple files were uploaded; submit exactly one file")]
    MultipleFiles,

    /// Temp file could not be created or written
    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// A persisted upload, deleted when dropped
#[derive(Debug)]
pub struct UploadedFile {
    path: TempPath,
    original_name: String,
    size_bytes: u64,
}

impl UploadedFile {
    /// Location of the persisted bytes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as sent by the client
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// Receives multipart uploads into a directory
#[derive(Debug, Clone)]
pub struct UploadReceiver {
    upload_dir: PathBuf,
}

impl UploadReceiver {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Persist exactly one uploaded file
    ///
    /// Parts without a file name (plain form fields, empty file inputs) are
    /// ignored. The field name of the file part is not checked.
    pub async fn receive(&self, multipart: &mut Multipart) -> Result<UploadedFile, UploadError> {
        let mut upload: Option<UploadedFile> = None;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::FormParse(e.to_string()))?
        {
            // Browsers send `filename=""` for a file input left empty
            let Some(file_name) = field
                .file_name()
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
            else {
                debug!(field = ?field.name(), "Ignoring non-file form field");
                continue;
            };

            if upload.is_some() {
                return Err(UploadError::MultipleFiles);
            }

            let temp = tempfile::Builder::new()
                .prefix("musan-upload-")
                .suffix(&temp_suffix(&file_name))
                .tempfile_in(&self.upload_dir)?;
            let (file, path) = temp.into_parts();
            let mut file = tokio::fs::File::from_std(file);

            let mut size_bytes = 0u64;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| UploadError::FormParse(e.to_string()))?
            {
                file.write_all(&chunk).await?;
                size_bytes += chunk.len() as u64;
            }
            file.flush().await?;

            debug!(
                file_name = %file_name,
                path = %path.display(),
                size_bytes,
                "Upload stored"
            );

            upload = Some(UploadedFile {
                path,
                original_name: file_name,
                size_bytes,
            });
        }

        upload.ok_or(UploadError::MissingFile)
    }
}

/// `.ext` of the client file name when it is short and alphanumeric, else empty
fn temp_suffix(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty() && e.len() <= MAX_EXTENSION_LEN && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}
