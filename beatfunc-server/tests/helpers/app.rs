//! Router fixture backed by a temporary work directory

use std::sync::Arc;

use axum::Router;
use beatfunc_common::config::TomlConfig;
use tempfile::TempDir;

use beatfunc_server::engine::OutputFormat;
use beatfunc_server::services::{AudioDownloader, Pipeline, ResultCache};
use beatfunc_server::{build_router, AppState, Args, ServiceConfig};

use super::stub_engine::{CountingEngine, FailingDownloader};

pub const BOUNDARY: &str = "beatfunc-test-boundary";

/// Service wired to a counting engine, producing WAV output
pub struct TestApp {
    pub temp_dir: TempDir,
    pub config: ServiceConfig,
    pub state: AppState,
    pub engine: Arc<CountingEngine>,
    pub cache: Arc<ResultCache>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(CountingEngine::new(), Arc::new(FailingDownloader), 8)
    }

    pub fn build(
        engine: CountingEngine,
        downloader: Arc<dyn AudioDownloader>,
        cache_capacity: usize,
    ) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let args = Args {
            work_dir: Some(temp_dir.path().join("work")),
            output_format: Some(OutputFormat::Wav),
            cache_capacity: Some(cache_capacity),
            ..Args::default()
        };
        let config = ServiceConfig::resolve(&args, &TomlConfig::default()).unwrap();
        config.work_dir.ensure_directories_exist().unwrap();

        let engine = Arc::new(engine);
        let cache = Arc::new(ResultCache::new(config.work_dir.cache_dir(), config.cache_capacity).unwrap());
        let pipeline = Arc::new(Pipeline::new(Arc::clone(&cache), engine.clone(), config.limits));
        let state = AppState::new(pipeline, downloader, config.work_dir.clone());

        Self {
            temp_dir,
            config,
            state,
            engine,
            cache,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Files currently in the incoming directory
    pub fn incoming_files(&self) -> usize {
        std::fs::read_dir(self.config.work_dir.incoming_dir())
            .unwrap()
            .count()
    }
}

/// Multipart body with optional `effects` and `song` fields
pub fn multipart_body(effects: Option<&str>, song: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    if let Some(effects) = effects {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"effects\"\r\n\r\n");
        body.extend_from_slice(effects.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    if let Some((filename, bytes)) = song {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"song\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
