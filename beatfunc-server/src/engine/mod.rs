//! Beat engine boundary
//!
//! The pipeline only talks to [`BeatEngine`]: detect beats in a source file,
//! apply one effect to an analysis, render an analysis to audio bytes. All
//! three are CPU-bound and synchronous; callers run them on the blocking pool.
//!
//! [`SignalBeatEngine`] is the built-in implementation.

pub mod decode;
pub mod detect;
pub mod effects;
pub mod render;
pub mod signal;

pub use signal::SignalBeatEngine;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{BpmWindow, Effect};

/// Beat engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Beat analysis failed: {0}")]
    Analysis(String),

    #[error("Effect {effect} failed: {reason}")]
    Effect { effect: &'static str, reason: String },

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One beat of audio, interleaved samples in `[-1.0, 1.0]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beat {
    pub samples: Vec<f32>,
}

impl Beat {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self, channels: u16) -> usize {
        self.samples.len() / usize::from(channels.max(1))
    }
}

/// Result of beat detection: the song cut into consecutive beats
///
/// Concatenating `beats` reproduces the analyzed signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatAnalysis {
    pub sample_rate: u32,
    pub channels: u16,
    pub tempo_bpm: f32,
    pub beats: Vec<Beat>,
}

impl BeatAnalysis {
    /// Same stream parameters, different beats
    pub fn with_beats(&self, beats: Vec<Beat>) -> Self {
        Self {
            sample_rate: self.sample_rate,
            channels: self.channels,
            tempo_bpm: self.tempo_bpm,
            beats,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.beats.iter().map(|b| b.frames(self.channels)).sum()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Container produced by [`BeatEngine::render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp3,
    Wav,
}

impl OutputFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Wav => "audio/wav",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(OutputFormat::Mp3),
            "wav" => Ok(OutputFormat::Wav),
            other => Err(format!("unsupported output format: {}", other)),
        }
    }
}

/// Encoded audio ready to be streamed to a client
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

/// Beat detection, effect application and rendering
pub trait BeatEngine: Send + Sync {
    /// Detect beats in `source` with tempo limited to `window`
    fn analyze(&self, source: &Path, window: BpmWindow) -> Result<BeatAnalysis, EngineError>;

    /// Apply one effect, producing a new analysis
    fn apply(&self, analysis: &BeatAnalysis, effect: &Effect) -> Result<BeatAnalysis, EngineError>;

    /// Encode an analysis into `format`
    fn render(&self, analysis: &BeatAnalysis, format: OutputFormat) -> Result<EncodedAudio, EngineError>;
}
