//! Built-in beat engine working directly on decoded PCM

use std::path::{Path, PathBuf};

use super::decode::decode_audio_file;
use super::detect::{beat_starts, estimate_tempo, grid_phase, onset_envelope, HOP_SIZE};
use super::effects::apply_effect;
use super::render::{render_wav, transcode_to_mp3};
use super::{Beat, BeatAnalysis, BeatEngine, EncodedAudio, EngineError, OutputFormat};
use crate::models::{BpmWindow, Effect};

/// Signal-processing beat engine
pub struct SignalBeatEngine {
    ffmpeg: PathBuf,
}

impl SignalBeatEngine {
    /// Create an engine that encodes MP3 with the ffmpeg binary at `ffmpeg`
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

impl Default for SignalBeatEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl BeatEngine for SignalBeatEngine {
    fn analyze(&self, source: &Path, window: BpmWindow) -> Result<BeatAnalysis, EngineError> {
        if window.min_bpm <= 0.0 || window.min_bpm > window.max_bpm {
            return Err(EngineError::Analysis(format!(
                "invalid BPM window {}..{}",
                window.min_bpm, window.max_bpm
            )));
        }

        let audio = decode_audio_file(source)?;
        if audio.channels == 0 || audio.sample_rate == 0 {
            return Err(EngineError::Analysis("empty stream parameters".to_string()));
        }

        let envelope = onset_envelope(&audio.to_mono());
        let tempo = match estimate_tempo(&envelope, audio.sample_rate, window) {
            Some(bpm) => bpm,
            None => {
                let fallback = (window.min_bpm + window.max_bpm) / 2.0;
                tracing::debug!(
                    path = %source.display(),
                    fallback_bpm = fallback,
                    "No periodicity found, using window midpoint"
                );
                fallback
            }
        };

        let period_hops = 60.0 * audio.sample_rate as f32 / (tempo * HOP_SIZE as f32);
        let phase_frames = grid_phase(&envelope, period_hops) * HOP_SIZE;
        let starts = beat_starts(audio.frames(), audio.sample_rate, tempo, phase_frames);

        let channels = usize::from(audio.channels);
        let total_frames = audio.frames();
        let beats: Vec<Beat> = starts
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = starts.get(i + 1).copied().unwrap_or(total_frames);
                Beat::new(audio.samples[start * channels..end * channels].to_vec())
            })
            .filter(|beat| !beat.samples.is_empty())
            .collect();

        tracing::info!(
            path = %source.display(),
            tempo_bpm = format!("{:.1}", tempo),
            beats = beats.len(),
            "Beat analysis complete"
        );

        Ok(BeatAnalysis {
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            tempo_bpm: tempo,
            beats,
        })
    }

    fn apply(&self, analysis: &BeatAnalysis, effect: &Effect) -> Result<BeatAnalysis, EngineError> {
        apply_effect(analysis, effect)
    }

    fn render(&self, analysis: &BeatAnalysis, format: OutputFormat) -> Result<EncodedAudio, EngineError> {
        let wav = render_wav(analysis)?;
        let bytes = match format {
            OutputFormat::Wav => wav,
            OutputFormat::Mp3 => transcode_to_mp3(&self.ffmpeg, wav)?,
        };
        Ok(EncodedAudio { bytes, format })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_click_track(path: &Path, bpm: f32, seconds: f32, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let period = (60.0 / bpm * sample_rate as f32) as usize;
        let burst = sample_rate as usize / 50;
        for i in 0..(seconds * sample_rate as f32) as usize {
            let value = if i % period < burst { i16::MAX / 2 } else { 0 };
            writer.write_sample(value).unwrap();
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_analysis_partitions_signal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clicks.wav");
        write_click_track(&path, 120.0, 8.0, 22_050);

        let engine = SignalBeatEngine::default();
        let window = BpmWindow { min_bpm: 100.0, max_bpm: 140.0 };
        let analysis = engine.analyze(&path, window).unwrap();

        assert_eq!(analysis.channels, 2);
        assert_eq!(analysis.total_frames(), 8 * 22_050);
        assert!((100.0..=140.0).contains(&analysis.tempo_bpm));
        assert!(analysis.beats.len() >= 10, "got {} beats", analysis.beats.len());
    }

    #[test]
    fn test_rejects_inverted_window() {
        let engine = SignalBeatEngine::default();
        let window = BpmWindow { min_bpm: 200.0, max_bpm: 100.0 };
        let err = engine.analyze(Path::new("/unused.wav"), window).unwrap_err();
        assert!(matches!(err, EngineError::Analysis(_)));
    }

    #[test]
    fn test_wav_render_round_trip_length() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clicks.wav");
        write_click_track(&path, 120.0, 4.0, 8_000);

        let engine = SignalBeatEngine::default();
        let analysis = engine.analyze(&path, BpmWindow::default()).unwrap();
        let reversed = engine.apply(&analysis, &Effect::Reverse).unwrap();
        let encoded = engine.render(&reversed, OutputFormat::Wav).unwrap();

        let reader = hound::WavReader::new(std::io::Cursor::new(encoded.bytes)).unwrap();
        assert_eq!(reader.duration() as usize, 4 * 8_000);
    }
}
