//! `POST /`: process an uploaded song

use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use tokio::io::AsyncWriteExt;

use super::request::EffectRequest;
use super::run_song;
use crate::error::{ApiError, ApiResult};
use crate::services::temp_files::{extension_from_filename, TempSource};
use crate::AppState;

/// POST /
///
/// Multipart form with an `effects` JSON field and a `song` file field.
/// Unknown fields are ignored.
pub async fn process_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    tracing::info!("Received song data");

    let mut effects: Option<String> = None;
    let mut song: Option<TempSource> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("effects") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?;
                effects = Some(text);
            }
            Some("song") => {
                let extension = extension_from_filename(field.file_name());
                let source = TempSource::create(&state.work_dir.incoming_dir(), &extension);

                let mut file = tokio::fs::File::create(source.path()).await?;
                let mut written = 0usize;
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
                {
                    file.write_all(&chunk).await?;
                    written += chunk.len();
                }
                file.flush().await?;

                tracing::debug!(path = %source.path().display(), bytes = written, "Stored upload");
                song = Some(source);
            }
            _ => {}
        }
    }

    let effects = effects.ok_or_else(|| ApiError::bad_request("Missing effects"))?;
    let request = EffectRequest::from_form_field(&effects)?;
    let source = song.ok_or_else(|| ApiError::bad_request("Missing song"))?;

    run_song(&state, source, request).await
}

/// Build upload routes
pub fn process_routes() -> Router<AppState> {
    Router::new().route("/", post(process_upload))
}
