//! HTTP API handlers
//!
//! - `POST /`: multipart upload (`effects` + `song`)
//! - `POST /yt`: JSON body naming a remote video
//! - `GET /health`: liveness and cache statistics

pub mod health;
pub mod process;
pub mod request;
pub mod youtube;

pub use health::health_routes;
pub use process::process_routes;
pub use youtube::youtube_routes;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

use crate::error::{ApiError, ApiResult};
use crate::services::{SongJob, TempSource};
use crate::AppState;
use request::EffectRequest;

/// Run one song through the pipeline and stream the encoded result
///
/// Dropping this future (client disconnect) cancels the job; the source file
/// is removed either way.
pub(crate) async fn run_song(
    state: &AppState,
    source: TempSource,
    request: EffectRequest,
) -> ApiResult<Response> {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let job = SongJob::new(source, request.chain, request.window);
    match state.pipeline.run(job, cancel).await {
        Ok(audio) => Ok((
            [(header::CONTENT_TYPE, audio.format.content_type())],
            audio.bytes,
        )
            .into_response()),
        Err(e) => {
            let err = ApiError::from(e);
            if err.is_internal() {
                *state.last_error.write().await = Some(err.to_string());
            }
            Err(err)
        }
    }
}
