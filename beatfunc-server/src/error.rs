//! HTTP-facing error type
//!
//! Every failure leaves the service as `{"detail": "..."}`. Client mistakes
//! carry their own message; internal failures are logged in full and answered
//! with a generic one.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{ChainError, SettingsError};
use crate::services::{DownloadError, PipelineError};

/// Message returned for any 5xx
pub const INTERNAL_DETAIL: &str = "Failed to process song";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Well-formed request for an unusable song (422)
    #[error("{0}")]
    Unprocessable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Common error: {0}")]
    Common(#[from] beatfunc_common::Error),
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) | ApiError::Io(_) | ApiError::Common(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidEffect(inner) => {
                tracing::debug!(error = %inner, "Rejected effect descriptor");
                ApiError::bad_request("Invalid effect data")
            }
            bounds => ApiError::BadRequest(bounds.to_string()),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        tracing::debug!(error = %err, "Rejected settings");
        ApiError::bad_request("Invalid settings")
    }
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        tracing::warn!(error = %err, "Download failed");
        ApiError::bad_request("Failed to download video")
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MetadataUnreadable(ref reason) => {
                tracing::debug!(reason = %reason, "Unreadable song metadata");
                ApiError::Unprocessable(err.to_string())
            }
            PipelineError::TooLong { .. } => ApiError::Unprocessable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if self.is_internal() {
            tracing::error!(error = %self, "Request failed");
            INTERNAL_DETAIL.to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EffectError;

    #[test]
    fn test_chain_errors_map_to_client_messages() {
        assert_eq!(
            ApiError::from(ChainError::TooMany).to_string(),
            "Too many effects (max is 5)"
        );
        assert_eq!(
            ApiError::from(ChainError::TooFew).to_string(),
            "Not enough effects (min is 1)"
        );
        let invalid = ApiError::from(ChainError::InvalidEffect(EffectError::MissingType));
        assert_eq!(invalid.to_string(), "Invalid effect data");
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_pipeline_errors_status() {
        let too_long = ApiError::from(PipelineError::TooLong { max_seconds: 390 });
        assert_eq!(too_long.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(too_long.to_string(), "Song is too long (max is 390 seconds)");

        let unreadable = ApiError::from(PipelineError::MetadataUnreadable("eof".into()));
        assert_eq!(unreadable.to_string(), "Failed to read song metadata");

        let failed = ApiError::from(PipelineError::Cancelled);
        assert!(failed.is_internal());
    }
}
