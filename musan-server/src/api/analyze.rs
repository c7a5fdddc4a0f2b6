//! Track analysis handler
//!
//! POST /analyze (multipart/form-data, one file part)

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use std::time::Duration;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::AnalysisResponse,
    services::decode_audio_file,
    AppState,
};

/// POST /analyze
///
/// Upload → metadata + decode (concurrently, blocking pool) → analysis →
/// one JSON object. Fails atomically: any error yields `{"error": ...}`.
pub async fn analyze_track(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<AnalysisResponse>> {
    let mut multipart = multipart.map_err(|e| ApiError::FormParse(e.body_text()))?;

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("analyze", %request_id);
    let timeout_secs = state.config.request_timeout_secs;

    // On timeout the pipeline future is dropped: the upload is deleted and
    // stages not yet started never run. A blocking stage already running
    // cannot be interrupted; it finishes on the blocking pool and its result
    // is discarded.
    let response = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        run_pipeline(&state, &mut multipart).instrument(span),
    )
    .await
    .map_err(|_| ApiError::Timeout(timeout_secs))??;

    Ok(Json(response))
}

async fn run_pipeline(state: &AppState, multipart: &mut Multipart) -> ApiResult<AnalysisResponse> {
    let upload = state.receiver.receive(multipart).await?;
    info!(
        file_name = %upload.original_name(),
        size_bytes = upload.size_bytes(),
        "Upload received"
    );

    let metadata_task = tokio::task::spawn_blocking({
        let extractor = state.metadata;
        let path = upload.path().to_path_buf();
        move || extractor.extract(&path)
    });
    let decode_task = tokio::task::spawn_blocking({
        let path = upload.path().to_path_buf();
        move || decode_audio_file(&path)
    });
    let (metadata, decoded) = tokio::join!(metadata_task, decode_task);

    // Decode failures carry the format hint, so they win over metadata failures
    let decoded = decoded.map_err(|e| ApiError::Internal(format!("Decode task failed: {e}")))??;
    let metadata =
        metadata.map_err(|e| ApiError::Internal(format!("Metadata task failed: {e}")))??;

    let analyzer = state.analyzer.clone();
    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&decoded))
        .await
        .map_err(|e| ApiError::Internal(format!("Analysis task failed: {e}")))??;

    info!(
        title = ?metadata.title,
        artist = ?metadata.artist,
        key = %result.key,
        mode = %result.mode,
        bpm = result.bpm,
        "Analysis complete"
    );

    // Temp file removed here, before the response is written
    drop(upload);

    Ok(AnalysisResponse::assemble(result, metadata))
}

/// Build analysis routes
pub fn analyze_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().route(
        "/analyze",
        post(analyze_track).layer(DefaultBodyLimit::max(max_upload_bytes)),
    )
}
