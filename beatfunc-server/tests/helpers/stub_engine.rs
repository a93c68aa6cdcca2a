//! Test doubles for the beat engine and the downloader

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use beatfunc_server::engine::{
    BeatAnalysis, BeatEngine, EncodedAudio, EngineError, OutputFormat, SignalBeatEngine,
};
use beatfunc_server::models::{BpmWindow, Effect};
use beatfunc_server::services::{AudioDownloader, DownloadError, TempSource};

/// Real engine that counts beat analyses
pub struct CountingEngine {
    inner: SignalBeatEngine,
    analyses: AtomicUsize,
    applies: AtomicUsize,
    delay: Duration,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Hold every analysis for `delay` so concurrent requests overlap
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            inner: SignalBeatEngine::default(),
            analyses: AtomicUsize::new(0),
            applies: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn analyses(&self) -> usize {
        self.analyses.load(Ordering::SeqCst)
    }

    /// Effects applied so far, across all requests
    pub fn applies(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }
}

impl BeatEngine for CountingEngine {
    fn analyze(&self, source: &Path, window: BpmWindow) -> Result<BeatAnalysis, EngineError> {
        self.analyses.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.analyze(source, window)
    }

    fn apply(&self, analysis: &BeatAnalysis, effect: &Effect) -> Result<BeatAnalysis, EngineError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        self.inner.apply(analysis, effect)
    }

    fn render(&self, analysis: &BeatAnalysis, format: OutputFormat) -> Result<EncodedAudio, EngineError> {
        self.inner.render(analysis, format)
    }
}

/// Downloader that "downloads" a local fixture
pub struct FixtureDownloader {
    pub fixture: PathBuf,
}

#[async_trait]
impl AudioDownloader for FixtureDownloader {
    async fn download(&self, _url: &str, dest_dir: &Path) -> Result<TempSource, DownloadError> {
        let target = TempSource::create(dest_dir, "wav");
        tokio::fs::copy(&self.fixture, target.path())
            .await
            .map_err(|source| DownloadError::Spawn {
                program: "fixture".to_string(),
                source,
            })?;
        Ok(target)
    }
}

/// Downloader that always fails
pub struct FailingDownloader;

#[async_trait]
impl AudioDownloader for FailingDownloader {
    async fn download(&self, _url: &str, _dest_dir: &Path) -> Result<TempSource, DownloadError> {
        Err(DownloadError::Failed {
            status: "exit status: 1".to_string(),
            stderr: "ERROR: Unsupported URL".to_string(),
        })
    }
}
