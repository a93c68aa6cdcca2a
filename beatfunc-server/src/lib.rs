//! beatfunc-server library interface
//!
//! Exposes the router and its building blocks for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;

pub use crate::config::{Args, ServiceConfig};
pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use beatfunc_common::config::WorkDir;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::services::{AudioDownloader, Pipeline};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub downloader: Arc<dyn AudioDownloader>,
    pub work_dir: WorkDir,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last internal error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, downloader: Arc<dyn AudioDownloader>, work_dir: WorkDir) -> Self {
        Self {
            pipeline,
            downloader,
            work_dir,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState, config: &ServiceConfig) -> Router {
    Router::new()
        .merge(api::process_routes())
        .merge(api::youtube_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(config.cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
