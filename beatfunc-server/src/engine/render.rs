//! Rendering analyses back to audio
//!
//! WAV is written in-process with hound. MP3 is produced by piping that WAV
//! through ffmpeg (libmp3lame, 192 kbps).

use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use super::{BeatAnalysis, EngineError};

/// 16-bit PCM WAV of all beats in order
pub fn render_wav(analysis: &BeatAnalysis) -> Result<Vec<u8>, EngineError> {
    let spec = hound::WavSpec {
        channels: analysis.channels,
        sample_rate: analysis.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| EngineError::Encode(e.to_string()))?;
        for beat in &analysis.beats {
            for &sample in &beat.samples {
                let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                writer
                    .write_sample(value)
                    .map_err(|e| EngineError::Encode(e.to_string()))?;
            }
        }
        writer
            .finalize()
            .map_err(|e| EngineError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Transcode WAV bytes to MP3 with the ffmpeg binary at `ffmpeg`
pub fn transcode_to_mp3(ffmpeg: &Path, wav: Vec<u8>) -> Result<Vec<u8>, EngineError> {
    let mut child = Command::new(ffmpeg)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "wav",
            "-i",
            "pipe:0",
            "-codec:a",
            "libmp3lame",
            "-b:a",
            "192k",
            "-f",
            "mp3",
            "pipe:1",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| EngineError::Encode(format!("failed to start {}: {}", ffmpeg.display(), e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| EngineError::Encode("ffmpeg stdin unavailable".to_string()))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| EngineError::Encode("ffmpeg stdout unavailable".to_string()))?;

    // Feed stdin from another thread so a full stdout pipe cannot deadlock us
    let writer = std::thread::spawn(move || stdin.write_all(&wav));

    let mut mp3 = Vec::new();
    stdout.read_to_end(&mut mp3)?;

    let output = child.wait_with_output()?;
    let fed = writer
        .join()
        .map_err(|_| EngineError::Encode("ffmpeg writer thread panicked".to_string()))?;

    if !output.status.success() {
        return Err(EngineError::Encode(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    fed?;

    Ok(mp3)
}
