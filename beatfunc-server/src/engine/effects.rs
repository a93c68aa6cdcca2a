//! Effect application
//!
//! Every effect is a pure function of the input analysis: beats are cloned or
//! rearranged, never mutated in place.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{Beat, BeatAnalysis, EngineError};
use crate::models::Effect;

/// Longest audio any effect may produce
pub const MAX_OUTPUT_SECS: usize = 60 * 60;

fn selected(index: usize, period: usize, offset: usize) -> bool {
    index >= offset && (index - offset) % period == 0
}

/// Apply `effect` to `analysis`
pub fn apply_effect(analysis: &BeatAnalysis, effect: &Effect) -> Result<BeatAnalysis, EngineError> {
    if analysis.channels == 0 {
        return Err(EngineError::Effect {
            effect: effect.name(),
            reason: "analysis has no channels".to_string(),
        });
    }

    let beats = &analysis.beats;
    let result: Vec<Beat> = match *effect {
        Effect::Silence { period, offset } => beats
            .iter()
            .enumerate()
            .map(|(i, beat)| {
                if selected(i, period, offset) {
                    Beat::new(vec![0.0; beat.samples.len()])
                } else {
                    beat.clone()
                }
            })
            .collect(),

        Effect::Remove { period, offset } => beats
            .iter()
            .enumerate()
            .filter(|(i, _)| !selected(*i, period, offset))
            .map(|(_, beat)| beat.clone())
            .collect(),

        Effect::Randomize { seed } => {
            let mut shuffled = beats.clone();
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            shuffled.shuffle(&mut rng);
            shuffled
        }

        Effect::Reverse => beats.iter().rev().cloned().collect(),

        Effect::Repeat { times, period, offset } => {
            let limit = MAX_OUTPUT_SECS.saturating_mul(analysis.sample_rate as usize);
            let mut frames: usize = 0;
            for (i, beat) in beats.iter().enumerate() {
                let copies = if selected(i, period, offset) { times } else { 1 };
                frames = beat
                    .frames(analysis.channels)
                    .checked_mul(copies)
                    .and_then(|n| n.checked_add(frames))
                    .filter(|&n| n <= limit)
                    .ok_or_else(|| EngineError::Effect {
                        effect: effect.name(),
                        reason: format!("output would exceed {} seconds", MAX_OUTPUT_SECS),
                    })?;
            }

            let mut repeated = Vec::with_capacity(beats.len());
            for (i, beat) in beats.iter().enumerate() {
                let copies = if selected(i, period, offset) { times } else { 1 };
                repeated.extend(std::iter::repeat(beat).take(copies).cloned());
            }
            repeated
        }

        Effect::Swap {
            x_period,
            y_period,
            group_size,
            offset,
        } => {
            let mut swapped = beats.clone();
            let start = offset.min(swapped.len());
            for group in swapped[start..].chunks_mut(group_size) {
                let (x, y) = (x_period - 1, y_period - 1);
                if x < group.len() && y < group.len() {
                    group.swap(x, y);
                }
            }
            swapped
        }

        Effect::Cut {
            denominator,
            take_index,
            period,
            offset,
        } => {
            let channels = usize::from(analysis.channels);
            beats
                .iter()
                .enumerate()
                .map(|(i, beat)| {
                    let frames = beat.frames(analysis.channels);
                    if !selected(i, period, offset) || frames < denominator {
                        return beat.clone();
                    }
                    let slice = frames / denominator;
                    let start = take_index * slice * channels;
                    Beat::new(beat.samples[start..start + slice * channels].to_vec())
                })
                .collect()
        }
    };

    Ok(analysis.with_beats(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mono analysis whose beat `i` is four samples of value `i`
    fn numbered(count: usize) -> BeatAnalysis {
        BeatAnalysis {
            sample_rate: 8,
            channels: 1,
            tempo_bpm: 120.0,
            beats: (0..count).map(|i| Beat::new(vec![i as f32; 4])).collect(),
        }
    }

    fn order(analysis: &BeatAnalysis) -> Vec<f32> {
        analysis.beats.iter().map(|b| b.samples[0]).collect()
    }

    #[test]
    fn test_reverse() {
        let out = apply_effect(&numbered(4), &Effect::Reverse).unwrap();
        assert_eq!(order(&out), vec![3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_remove_every_other() {
        let out = apply_effect(&numbered(5), &Effect::Remove { period: 2, offset: 0 }).unwrap();
        assert_eq!(order(&out), vec![1.0, 3.0]);
    }

    #[test]
    fn test_silence_keeps_length() {
        let input = numbered(4);
        let out = apply_effect(&input, &Effect::Silence { period: 2, offset: 1 }).unwrap();
        assert_eq!(out.total_frames(), input.total_frames());
        assert_eq!(order(&out), vec![0.0, 0.0, 2.0, 0.0]);
        assert!(out.beats[3].samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_repeat() {
        let out = apply_effect(&numbered(3), &Effect::Repeat { times: 2, period: 2, offset: 0 }).unwrap();
        assert_eq!(order(&out), vec![0.0, 0.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_repeat_with_absurd_times_is_error() {
        let effect = Effect::Repeat {
            times: 1 << 62,
            period: 1,
            offset: 0,
        };
        let err = apply_effect(&numbered(4), &effect).unwrap_err();
        assert!(matches!(err, EngineError::Effect { effect: "repeat", .. }));
    }

    #[test]
    fn test_chained_repeats_bounded_by_output_length() {
        // One frame per second, so the limit is MAX_OUTPUT_SECS frames
        let mut current = BeatAnalysis {
            sample_rate: 1,
            channels: 1,
            tempo_bpm: 60.0,
            beats: vec![Beat::new(vec![0.5; 100]); 4],
        };
        let effect = Effect::Repeat {
            times: 16,
            period: 1,
            offset: 0,
        };

        let mut failed = false;
        for _ in 0..5 {
            match apply_effect(&current, &effect) {
                Ok(next) => {
                    assert!(next.total_frames() <= MAX_OUTPUT_SECS);
                    current = next;
                }
                Err(EngineError::Effect { effect, .. }) => {
                    assert_eq!(effect, "repeat");
                    failed = true;
                    break;
                }
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert!(failed);
    }

    #[test]
    fn test_swap_within_groups() {
        let effect = Effect::Swap {
            x_period: 2,
            y_period: 4,
            group_size: 4,
            offset: 0,
        };
        let out = apply_effect(&numbered(10), &effect).unwrap();
        // The trailing group [8, 9] has no fourth beat and is untouched
        assert_eq!(
            order(&out),
            vec![0.0, 3.0, 2.0, 1.0, 4.0, 7.0, 6.0, 5.0, 8.0, 9.0]
        );
    }

    #[test]
    fn test_cut_takes_slice() {
        let mut input = numbered(2);
        input.beats[0] = Beat::new(vec![1.0, 2.0, 3.0, 4.0]);
        let effect = Effect::Cut {
            denominator: 2,
            take_index: 1,
            period: 1,
            offset: 0,
        };
        let out = apply_effect(&input, &effect).unwrap();
        assert_eq!(out.beats[0].samples, vec![3.0, 4.0]);
        assert_eq!(out.beats[1].samples.len(), 2);
    }

    #[test]
    fn test_cut_respects_channels() {
        let input = BeatAnalysis {
            sample_rate: 8,
            channels: 2,
            tempo_bpm: 120.0,
            beats: vec![Beat::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8])],
        };
        let effect = Effect::Cut {
            denominator: 4,
            take_index: 3,
            period: 1,
            offset: 0,
        };
        let out = apply_effect(&input, &effect).unwrap();
        assert_eq!(out.beats[0].samples, vec![0.7, 0.8]);
    }

    #[test]
    fn test_seeded_randomize_is_reproducible_permutation() {
        let input = numbered(16);
        let effect = Effect::Randomize { seed: Some(42) };
        let a = apply_effect(&input, &effect).unwrap();
        let b = apply_effect(&input, &effect).unwrap();
        assert_eq!(a, b);

        let mut sorted = order(&a);
        sorted.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(sorted, order(&input));
    }

    #[test]
    fn test_input_untouched() {
        let input = numbered(4);
        let before = input.clone();
        apply_effect(&input, &Effect::Reverse).unwrap();
        assert_eq!(input, before);
    }
}
