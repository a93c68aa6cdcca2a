//! Tempo and beat grid detection
//!
//! Onset strength is the positive first difference of per-hop energy. The
//! tempo is the autocorrelation peak of that envelope over the lags allowed by
//! the BPM window, and the grid phase is the offset collecting the most onset
//! strength along the grid.

use crate::models::BpmWindow;

/// Analysis hop in frames
pub const HOP_SIZE: usize = 512;

/// Minimum normalized autocorrelation accepted as a tempo
const MIN_CORRELATION: f32 = 0.05;

/// Onset strength envelope of a mono signal, one value per hop
pub fn onset_envelope(mono: &[f32]) -> Vec<f32> {
    let energies: Vec<f32> = mono
        .chunks(HOP_SIZE)
        .map(|hop| hop.iter().map(|s| s * s).sum::<f32>() / hop.len() as f32)
        .collect();

    let mut envelope = Vec::with_capacity(energies.len());
    let mut previous = 0.0f32;
    for energy in energies {
        envelope.push((energy - previous).max(0.0));
        previous = energy;
    }
    envelope
}

/// Autocorrelation tempo estimate restricted to `window`
///
/// Returns `None` when the envelope is too short, flat, or shows no periodicity.
pub fn estimate_tempo(envelope: &[f32], sample_rate: u32, window: BpmWindow) -> Option<f32> {
    if envelope.len() < 64 || sample_rate == 0 {
        return None;
    }

    let frame_duration = HOP_SIZE as f32 / sample_rate as f32;
    let min_lag = ((60.0 / (window.max_bpm * frame_duration)).floor() as usize).max(1);
    let max_lag = ((60.0 / (window.min_bpm * frame_duration)).ceil() as usize).min(envelope.len() / 2);
    if min_lag > max_lag {
        return None;
    }

    // Subtract mean to remove DC bias
    let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
    let centered: Vec<f32> = envelope.iter().map(|&x| x - mean).collect();
    let energy: f32 = centered.iter().map(|&x| x * x).sum();
    if energy < 1e-10 {
        return None;
    }

    let n = centered.len();
    let corr_at = |lag: usize| -> f32 {
        centered[..n - lag]
            .iter()
            .zip(centered[lag..].iter())
            .map(|(&a, &b)| a * b)
            .sum::<f32>()
            / energy
    };

    let (best_lag, best_corr) = (min_lag..=max_lag)
        .map(|lag| (lag, corr_at(lag)))
        .fold((min_lag, f32::NEG_INFINITY), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });

    if best_corr < MIN_CORRELATION {
        return None;
    }

    // Parabolic interpolation around the peak for sub-frame precision
    let lag = if best_lag > min_lag && best_lag < max_lag {
        let prev = corr_at(best_lag - 1);
        let next = corr_at(best_lag + 1);
        let denom = prev - 2.0 * best_corr + next;
        if denom.abs() > 1e-10 {
            best_lag as f32 + 0.5 * (prev - next) / denom
        } else {
            best_lag as f32
        }
    } else {
        best_lag as f32
    };

    let bpm = 60.0 / (lag * frame_duration);
    Some(bpm.clamp(window.min_bpm, window.max_bpm))
}

/// Offset (in hops) of the beat grid with period `period_hops`
pub fn grid_phase(envelope: &[f32], period_hops: f32) -> usize {
    if envelope.is_empty() || period_hops <= 0.0 {
        return 0;
    }

    let candidates = (period_hops.ceil() as usize).clamp(1, envelope.len());
    let mut best_phase = 0;
    let mut best_score = f32::NEG_INFINITY;

    for phase in 0..candidates {
        let mut score = 0.0;
        let mut position = phase as f32;
        while (position.round() as usize) < envelope.len() {
            score += envelope[position.round() as usize];
            position += period_hops;
        }
        if score > best_score {
            best_score = score;
            best_phase = phase;
        }
    }

    best_phase
}

/// Start frame of every beat, beginning with 0
///
/// The stretch before the first grid line belongs to the first beat, so the
/// beats partition `0..total_frames`.
pub fn beat_starts(total_frames: usize, sample_rate: u32, tempo_bpm: f32, phase_frames: usize) -> Vec<usize> {
    let mut starts = vec![0];
    if total_frames == 0 || tempo_bpm <= 0.0 {
        return starts;
    }

    let period = 60.0 * sample_rate as f64 / f64::from(tempo_bpm);
    let mut k = 0u64;
    loop {
        let start = (phase_frames as f64 + k as f64 * period).round() as usize;
        if start >= total_frames {
            break;
        }
        if start > 0 && start > *starts.last().unwrap_or(&0) {
            starts.push(start);
        }
        k += 1;
    }
    starts
}
