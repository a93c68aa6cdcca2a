//! Container metadata checks for incoming songs
//!
//! Uses lofty to read the duration without decoding the audio.

use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Metadata validation errors
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read song metadata: {0}")]
    Unreadable(String),

    #[error("Song is too long ({actual:?} > {max:?})")]
    TooLong { actual: Duration, max: Duration },
}

/// Read the playback duration of `path`
pub fn probe_duration(path: &Path) -> Result<Duration, MetadataError> {
    let tagged_file = Probe::open(path)
        .map_err(|e| MetadataError::Unreadable(e.to_string()))?
        .guess_file_type()
        .map_err(|e| MetadataError::Unreadable(e.to_string()))?
        .read()
        .map_err(|e| MetadataError::Unreadable(e.to_string()))?;

    Ok(tagged_file.properties().duration())
}

/// Reject durations strictly longer than `max`
pub fn check_duration(actual: Duration, max: Duration) -> Result<(), MetadataError> {
    if actual > max {
        return Err(MetadataError::TooLong { actual, max });
    }
    Ok(())
}

/// Probe `path` and enforce `max`
pub fn validate_song(path: &Path, max: Duration) -> Result<Duration, MetadataError> {
    let duration = probe_duration(path)?;
    check_duration(duration, max)?;
    tracing::debug!(path = %path.display(), duration_ms = duration.as_millis() as u64, "Song metadata valid");
    Ok(duration)
}
