//! Tuning settings and the BPM search window

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MIN_BPM: f32 = 60.0;
pub const DEFAULT_MAX_BPM: f32 = 300.0;
pub const DEFAULT_DRIFT: i64 = 15;

/// Accepted range for `suggested_bpm`
pub const SUGGESTED_BPM_RANGE: std::ops::RangeInclusive<i64> = 1..=1000;
/// Accepted range for `drift`
pub const DRIFT_RANGE: std::ops::RangeInclusive<i64> = 0..=1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("suggested_bpm {0} is outside 1..=1000")]
    SuggestedBpm(i64),

    #[error("drift {0} is outside 0..=1000")]
    Drift(i64),
}

/// Client tuning settings
///
/// `drift` only matters together with `suggested_bpm`. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSettings {
    #[serde(default)]
    pub suggested_bpm: Option<i64>,
    #[serde(default)]
    pub drift: Option<i64>,
}

/// Tempo bounds handed to beat detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmWindow {
    pub min_bpm: f32,
    pub max_bpm: f32,
}

impl Default for BpmWindow {
    fn default() -> Self {
        Self {
            min_bpm: DEFAULT_MIN_BPM,
            max_bpm: DEFAULT_MAX_BPM,
        }
    }
}

impl ProcessingSettings {
    /// `[suggested - drift, suggested + drift]`, or the full default window
    ///
    /// The lower edge is clamped to 1 BPM.
    pub fn bpm_window(&self) -> Result<BpmWindow, SettingsError> {
        let Some(suggested) = self.suggested_bpm else {
            return Ok(BpmWindow::default());
        };
        if !SUGGESTED_BPM_RANGE.contains(&suggested) {
            return Err(SettingsError::SuggestedBpm(suggested));
        }

        let drift = self.drift.unwrap_or(DEFAULT_DRIFT);
        if !DRIFT_RANGE.contains(&drift) {
            return Err(SettingsError::Drift(drift));
        }

        Ok(BpmWindow {
            min_bpm: (suggested - drift).max(1) as f32,
            max_bpm: (suggested + drift) as f32,
        })
    }
}
