//! beatfunc-server - beat-level audio effects over HTTP
//!
//! Accepts a song (upload or remote video) and an effect chain, splits the
//! song into beats, rearranges them and streams back the result.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use beatfunc_server::engine::SignalBeatEngine;
use beatfunc_server::services::{sweep_orphans, Pipeline, ResultCache, YtDlpDownloader};
use beatfunc_server::{build_router, AppState, Args, ServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::load(&args).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{},tower_http=info", config.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting beatfunc-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    info!("Work directory: {}", config.work_dir.root().display());

    config
        .work_dir
        .ensure_directories_exist()
        .context("Failed to initialize work directory")?;

    // Nothing survives a restart: the cache index lives in memory only
    for dir in [config.work_dir.incoming_dir(), config.work_dir.cache_dir()] {
        let removed = sweep_orphans(&dir)
            .with_context(|| format!("Failed to sweep {}", dir.display()))?;
        if removed > 0 {
            info!("Removed {} leftover files from {}", removed, dir.display());
        }
    }

    let cache = Arc::new(
        ResultCache::new(config.work_dir.cache_dir(), config.cache_capacity)
            .context("Failed to initialize result cache")?,
    );
    info!("Result cache capacity: {}", cache.capacity());

    let engine = Arc::new(SignalBeatEngine::new(config.ffmpeg.clone()));
    let pipeline = Arc::new(Pipeline::new(cache, engine, config.limits));
    let downloader = Arc::new(YtDlpDownloader::new(config.ytdlp.clone()));

    let state = AppState::new(pipeline, downloader, config.work_dir.clone());
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
