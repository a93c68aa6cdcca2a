//! Audio Test Fixture Generator
//!
//! Click tracks with a known tempo, written as 16-bit WAV

use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Tempo of the clicks
    pub bpm: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 30.0,
            sample_rate: 8000,
            channels: 1,
            bpm: 120.0,
        }
    }
}

impl AudioConfig {
    /// Long files stay small at a low sample rate
    pub fn long(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            sample_rate: 1000,
            ..Self::default()
        }
    }
}

/// Generate a click-track WAV file with the given configuration
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let total_frames = (config.duration_seconds * config.sample_rate as f64) as usize;
    let period = ((60.0 / config.bpm) * config.sample_rate as f64) as usize;
    let click = (config.sample_rate as usize / 50).max(1);

    for i in 0..total_frames {
        let sample = if i % period < click {
            // Decaying 440Hz burst at the start of each beat
            let t = i as f32 / config.sample_rate as f32;
            let decay = 1.0 - (i % period) as f32 / click as f32;
            (0.6 * decay * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * i16::MAX as f32) as i16
        } else {
            0
        };

        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Bytes of a generated WAV file
pub fn generate_test_wav_bytes(dir: &Path, config: &AudioConfig) -> anyhow::Result<Vec<u8>> {
    let path = dir.join(format!("fixture-{}.wav", uuid::Uuid::new_v4()));
    generate_test_wav(&path, config)?;
    let bytes = std::fs::read(&path)?;
    std::fs::remove_file(&path)?;
    Ok(bytes)
}
