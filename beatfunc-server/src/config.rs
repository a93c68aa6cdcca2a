//! Service configuration
//!
//! Priority: command line, then environment (both through clap), then the TOML
//! bootstrap file, then compiled defaults. The work directory follows the
//! shared resolver in `beatfunc_common::config`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use beatfunc_common::config::{
    load_bootstrap_config, resolve_work_dir, TomlConfig, WorkDir, DEFAULT_ALLOWED_ORIGINS,
    DEFAULT_BIND, DEFAULT_CACHE_CAPACITY, DEFAULT_MAX_LENGTH_SECS, DEFAULT_MAX_UPLOAD_MB,
    DEFAULT_PROCESSING_TIMEOUT_SECS, WORK_DIR_ENV,
};
use beatfunc_common::{Error, Result};
use clap::Parser;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::warn;

use crate::engine::OutputFormat;
use crate::services::PipelineLimits;

/// Command-line arguments for beatfunc-server
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "beatfunc-server")]
#[command(about = "Beat-level audio effects over HTTP")]
#[command(version)]
pub struct Args {
    /// TOML bootstrap config file
    #[arg(short, long, env = "BEATFUNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address
    #[arg(short, long, env = "BEATFUNC_BIND")]
    pub bind: Option<SocketAddr>,

    /// Directory for incoming songs and cached analyses (also BEATFUNC_WORK_DIR)
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Maximum number of cached analyses
    #[arg(long, env = "BEATFUNC_CACHE_CAPACITY")]
    pub cache_capacity: Option<usize>,

    /// Longest accepted song in seconds
    #[arg(long, env = "BEATFUNC_MAX_LENGTH")]
    pub max_length: Option<u64>,

    /// Processing deadline per request in seconds
    #[arg(long, env = "BEATFUNC_PROCESSING_TIMEOUT")]
    pub processing_timeout: Option<u64>,

    /// Response format: mp3 or wav
    #[arg(long, env = "BEATFUNC_OUTPUT_FORMAT")]
    pub output_format: Option<OutputFormat>,

    /// yt-dlp executable
    #[arg(long, env = "BEATFUNC_YTDLP")]
    pub ytdlp: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, env = "BEATFUNC_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    /// Any non-empty value allows every CORS origin
    #[arg(long, env = "BEATFUNC_ALL_ORIGINS")]
    pub all_origins: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub work_dir: WorkDir,
    pub cache_capacity: usize,
    pub limits: PipelineLimits,
    pub max_upload_bytes: usize,
    pub ytdlp: PathBuf,
    pub ffmpeg: PathBuf,
    pub allow_all_origins: bool,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

impl ServiceConfig {
    /// Load the TOML file named by `args` (or the platform default) and resolve
    pub fn load(args: &Args) -> Result<Self> {
        let toml_config = load_bootstrap_config(args.config.as_deref())?;
        Self::resolve(args, &toml_config)
    }

    /// Merge `args` over `toml_config` over defaults
    pub fn resolve(args: &Args, toml_config: &TomlConfig) -> Result<Self> {
        let bind = match (args.bind, toml_config.bind.as_deref()) {
            (Some(bind), _) => bind,
            (None, Some(text)) => parse_bind(text)?,
            (None, None) => parse_bind(DEFAULT_BIND)?,
        };

        let output_format = match (args.output_format, toml_config.output_format.as_deref()) {
            (Some(format), _) => format,
            (None, Some(text)) => text.parse().map_err(Error::Config)?,
            (None, None) => OutputFormat::default(),
        };

        let max_length = args
            .max_length
            .or(toml_config.max_length_secs)
            .unwrap_or(DEFAULT_MAX_LENGTH_SECS);
        let processing_timeout = args
            .processing_timeout
            .or(toml_config.processing_timeout_secs)
            .unwrap_or(DEFAULT_PROCESSING_TIMEOUT_SECS);
        if processing_timeout == 0 {
            return Err(Error::Config("processing timeout must be positive".to_string()));
        }

        let cache_capacity = args
            .cache_capacity
            .or(toml_config.cache_capacity)
            .unwrap_or(DEFAULT_CACHE_CAPACITY);
        if cache_capacity == 0 {
            return Err(Error::Config("cache capacity must be at least 1".to_string()));
        }

        let max_upload_mb = toml_config.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        let allow_all_origins = args
            .all_origins
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty());
        let allowed_origins = toml_config.allowed_origins.clone().unwrap_or_else(|| {
            DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect()
        });

        Ok(Self {
            bind,
            work_dir: WorkDir::new(resolve_work_dir(
                args.work_dir.as_deref(),
                WORK_DIR_ENV,
                toml_config,
            )),
            cache_capacity,
            limits: PipelineLimits {
                max_duration: Duration::from_secs(max_length),
                processing_timeout: Duration::from_secs(processing_timeout),
                output_format,
            },
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            ytdlp: args
                .ytdlp
                .clone()
                .or_else(|| toml_config.ytdlp_path.clone())
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            ffmpeg: args
                .ffmpeg
                .clone()
                .or_else(|| toml_config.ffmpeg_path.clone())
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            allow_all_origins,
            allowed_origins,
            log_level: toml_config.logging.level.clone(),
        })
    }

    /// CORS policy for the router
    ///
    /// Listed origins get credentials; allowing every origin drops them.
    pub fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .max_age(Duration::from_secs(300));

        if self.allow_all_origins {
            return layer
                .allow_origin(AllowOrigin::any())
                .allow_headers(tower_http::cors::Any);
        }

        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}

fn parse_bind(text: &str) -> Result<SocketAddr> {
    text.parse()
        .map_err(|e| Error::Config(format!("Invalid bind address {:?}: {}", text, e)))
}
