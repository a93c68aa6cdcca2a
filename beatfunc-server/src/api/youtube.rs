//! `POST /yt`: process the audio of a remote video

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;

use super::request::EffectRequest;
use super::run_song;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Request body for `POST /yt`
#[derive(Debug, Deserialize)]
pub struct YoutubeSongPayload {
    pub youtube_url: String,
    #[serde(default)]
    pub effects: Option<Value>,
    #[serde(default)]
    pub settings: Option<Value>,
}

/// POST /yt
///
/// Effects are validated before anything is downloaded.
pub async fn process_youtube(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let payload: YoutubeSongPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected /yt body");
        ApiError::bad_request("Invalid request body")
    })?;

    let effects = payload
        .effects
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("Missing effects"))?;
    let request = EffectRequest::from_parts(effects, payload.settings.as_ref())?;

    tracing::info!(url = %payload.youtube_url, "Downloading file");
    let source = state
        .downloader
        .download(&payload.youtube_url, &state.work_dir.incoming_dir())
        .await?;

    run_song(&state, source, request).await
}

/// Build remote-video routes
pub fn youtube_routes() -> Router<AppState> {
    Router::new().route("/yt", post(process_youtube))
}
