//! Speech-to-text through the hosted transcription model.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::CurrentUser;
use crate::schemas::responder::{AudioUpload, TranscriptionReturn};
use crate::schemas::DetailResponse;
use crate::state::AppState;

/// The hosted endpoint rejects files over 25 MB.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(paths(transcribe), components(schemas(AudioUpload, TranscriptionReturn, DetailResponse)))]
pub struct TranscribeApi;

/// Register transcription routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/transcribe",
        post(transcribe).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
    )
}

/// Transcribe an English audio clip (`POST /transcribe`).
#[utoipa::path(
    post,
    path = "/transcribe",
    tag = "transcribe",
    request_body(content = AudioUpload, content_type = "multipart/form-data", description = "Audio upload in field `file`"),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Transcription", body = TranscriptionReturn),
        (status = 400, description = "Missing file", body = DetailResponse),
        (status = 500, description = "Transcription failed", body = DetailResponse),
    )
)]
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionReturn>, ServerError> {
    let mut audio = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("audio.webm").to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read file: {e}")))?;
        audio = Some((file_name, bytes.to_vec()));
        break;
    }
    let (file_name, bytes) = audio
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| ServerError::BadRequest("Missing file".into()))?;
    debug!(user_id = %user.id, file_name = %file_name, size = bytes.len(), "transcription request");

    let transcription = state
        .transcriber
        .transcribe(bytes, &file_name, &state.config.transcribe_model)
        .await
        .map_err(|e| ServerError::exposed(format!("Transcription failed: {e}")))?;
    info!(user_id = %user.id, chars = transcription.len(), "audio transcribed");
    Ok(Json(TranscriptionReturn { transcription }))
}
