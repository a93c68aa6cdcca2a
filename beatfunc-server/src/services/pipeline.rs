//! Per-song processing
//!
//! validate -> fingerprint -> resolve analysis (cache or engine) -> apply
//! effects -> encode. The source file belongs to the [`SongJob`] and is
//! deleted when the job is dropped, whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use beatfunc_common::config::{DEFAULT_MAX_LENGTH_SECS, DEFAULT_PROCESSING_TIMEOUT_SECS};
use beatfunc_common::fingerprint::fingerprint_file;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::metadata::{validate_song, MetadataError};
use super::result_cache::ResultCache;
use super::temp_files::TempSource;
use crate::engine::{BeatAnalysis, BeatEngine, EncodedAudio, EngineError, OutputFormat};
use crate::models::{BpmWindow, EffectChain};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read song metadata")]
    MetadataUnreadable(String),

    #[error("Song is too long (max is {max_seconds} seconds)")]
    TooLong { max_seconds: u64 },

    #[error("Failed to read song: {0}")]
    Read(#[from] std::io::Error),

    #[error("Processing failed: {0}")]
    ProcessingFailed(#[from] EngineError),

    #[error("Processing exceeded {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Processing cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Limits applied to every job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    /// Longest accepted song
    pub max_duration: Duration,
    /// Deadline for fingerprinting through encoding
    pub processing_timeout: Duration,
    pub output_format: OutputFormat,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(DEFAULT_MAX_LENGTH_SECS),
            processing_timeout: Duration::from_secs(DEFAULT_PROCESSING_TIMEOUT_SECS),
            output_format: OutputFormat::default(),
        }
    }
}

/// One request's worth of work
#[derive(Debug)]
pub struct SongJob {
    pub source: TempSource,
    pub chain: EffectChain,
    pub window: BpmWindow,
    pub started: Instant,
}

impl SongJob {
    pub fn new(source: TempSource, chain: EffectChain, window: BpmWindow) -> Self {
        Self {
            source,
            chain,
            window,
            started: Instant::now(),
        }
    }
}

/// Shared processing pipeline, one per service
pub struct Pipeline {
    cache: Arc<ResultCache>,
    engine: Arc<dyn BeatEngine>,
    limits: PipelineLimits,
}

impl Pipeline {
    pub fn new(cache: Arc<ResultCache>, engine: Arc<dyn BeatEngine>, limits: PipelineLimits) -> Self {
        Self {
            cache,
            engine,
            limits,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn limits(&self) -> PipelineLimits {
        self.limits
    }

    /// Process `job` to encoded audio
    ///
    /// `cancel` aborts the job between steps (client went away). The job's
    /// source file is gone by the time this returns.
    pub async fn run(&self, job: SongJob, cancel: CancellationToken) -> Result<EncodedAudio, PipelineError> {
        let SongJob {
            source,
            chain,
            window,
            started,
        } = job;

        tracing::info!(
            path = %source.path().display(),
            effects = ?chain.names(),
            min_bpm = window.min_bpm,
            max_bpm = window.max_bpm,
            "Processing song"
        );

        let result = self.run_steps(source.path(), &chain, window, &cancel).await;
        drop(source);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(audio) => tracing::info!(elapsed_ms, bytes = audio.bytes.len(), "Finished processing song"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "Song processing failed"),
        }
        result
    }

    async fn run_steps(
        &self,
        path: &Path,
        chain: &EffectChain,
        window: BpmWindow,
        cancel: &CancellationToken,
    ) -> Result<EncodedAudio, PipelineError> {
        self.validate(path).await?;

        let timeout = self.limits.processing_timeout;
        let steps = tokio::time::timeout(timeout, self.process(path, chain, window, cancel));

        tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            outcome = steps => outcome.unwrap_or(Err(PipelineError::DeadlineExceeded(timeout))),
        }
    }

    async fn validate(&self, path: &Path) -> Result<(), PipelineError> {
        let max = self.limits.max_duration;
        let owned = path.to_path_buf();
        let checked = tokio::task::spawn_blocking(move || validate_song(&owned, max))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        match checked {
            Ok(_) => Ok(()),
            Err(MetadataError::Unreadable(reason)) => Err(PipelineError::MetadataUnreadable(reason)),
            Err(MetadataError::TooLong { .. }) => Err(PipelineError::TooLong {
                max_seconds: max.as_secs(),
            }),
        }
    }

    async fn process(
        &self,
        path: &Path,
        chain: &EffectChain,
        window: BpmWindow,
        cancel: &CancellationToken,
    ) -> Result<EncodedAudio, PipelineError> {
        let owned: PathBuf = path.to_path_buf();
        let fingerprint = tokio::task::spawn_blocking(move || fingerprint_file(&owned))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))??;
        tracing::debug!(fingerprint = %fingerprint, "Fingerprinted song");

        let engine = Arc::clone(&self.engine);
        let source = path.to_path_buf();
        let (analysis, resolution) = self
            .cache
            .get_or_compute(fingerprint, move || async move {
                tokio::task::spawn_blocking(move || engine.analyze(&source, window))
                    .await
                    .map_err(|e| PipelineError::Internal(e.to_string()))?
                    .map_err(PipelineError::from)
            })
            .await?;
        tracing::info!(
            fingerprint = %fingerprint,
            resolution = ?resolution,
            beats = analysis.beats.len(),
            "Analysis resolved"
        );

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let transformed = self.apply_chain(analysis, chain, cancel).await?;

        let engine = Arc::clone(&self.engine);
        let format = self.limits.output_format;
        let encoded = tokio::task::spawn_blocking(move || engine.render(&transformed, format))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))??;
        Ok(encoded)
    }

    async fn apply_chain(
        &self,
        analysis: Arc<BeatAnalysis>,
        chain: &EffectChain,
        cancel: &CancellationToken,
    ) -> Result<BeatAnalysis, PipelineError> {
        let engine = Arc::clone(&self.engine);
        let chain = chain.clone();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let mut current = (*analysis).clone();
            for effect in &chain {
                if cancel.is_cancelled() {
                    return Err(PipelineError::Cancelled);
                }
                current = engine.apply(&current, effect)?;
                tracing::debug!(effect = effect.name(), beats = current.beats.len(), "Applied effect");
            }
            Ok(current)
        })
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))?
    }
}
