//! Effect descriptors and the effect registry
//!
//! A descriptor is a JSON object `{"type": <name>, ...parameters}`. Each known
//! name maps to a constructor that deserializes and validates the parameters,
//! producing an [`Effect`]. Anything else is an [`EffectError`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Effect descriptor errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EffectError {
    #[error("Effect descriptor must be a JSON object")]
    NotAnObject,

    #[error("Effect descriptor has no \"type\" field")]
    MissingType,

    #[error("Unknown effect type: {0}")]
    UnknownType(String),

    #[error("Invalid parameters for {effect}: {reason}")]
    InvalidParameters { effect: &'static str, reason: String },
}

/// A validated beat-level transform
///
/// Beat selection for periodic effects: beat `i` (zero-based) is selected when
/// `i >= offset` and `(i - offset) % period == 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Replace selected beats with silence of the same length
    Silence { period: usize, offset: usize },
    /// Drop selected beats
    Remove { period: usize, offset: usize },
    /// Shuffle all beats
    Randomize { seed: Option<u64> },
    /// Play beats in reverse order
    Reverse,
    /// Play each selected beat `times` times
    Repeat { times: usize, period: usize, offset: usize },
    /// Within each group of `group_size` beats, trade the `x_period`-th and
    /// `y_period`-th beats (one-based positions)
    Swap {
        x_period: usize,
        y_period: usize,
        group_size: usize,
        offset: usize,
    },
    /// Keep only slice `take_index` of `denominator` equal slices of each
    /// selected beat
    Cut {
        denominator: usize,
        take_index: usize,
        period: usize,
        offset: usize,
    },
}

/// Largest accepted `times` for [`Effect::Repeat`]
pub const MAX_REPEAT_TIMES: usize = 16;

type Constructor = fn(Value) -> Result<Effect, EffectError>;

/// Known effect names and their constructors
const REGISTRY: &[(&str, Constructor)] = &[
    ("silence", build_silence),
    ("remove", build_remove),
    ("randomize", build_randomize),
    ("reverse", build_reverse),
    ("repeat", build_repeat),
    ("swap", build_swap),
    ("cut", build_cut),
];

/// Names accepted in the `type` field
pub fn effect_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(name, _)| *name)
}

impl Effect {
    /// Resolve a JSON descriptor through the registry
    pub fn from_descriptor(descriptor: &Value) -> Result<Self, EffectError> {
        let object = descriptor.as_object().ok_or(EffectError::NotAnObject)?;
        let name = object
            .get("type")
            .ok_or(EffectError::MissingType)?
            .as_str()
            .ok_or(EffectError::MissingType)?;

        let (_, construct) = REGISTRY
            .iter()
            .find(|(known, _)| *known == name)
            .ok_or_else(|| EffectError::UnknownType(name.to_string()))?;

        let mut params = object.clone();
        params.remove("type");
        construct(Value::Object(params))
    }

    /// Registry name of this effect
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Silence { .. } => "silence",
            Effect::Remove { .. } => "remove",
            Effect::Randomize { .. } => "randomize",
            Effect::Reverse => "reverse",
            Effect::Repeat { .. } => "repeat",
            Effect::Swap { .. } => "swap",
            Effect::Cut { .. } => "cut",
        }
    }
}

fn params<T: DeserializeOwned>(effect: &'static str, value: Value) -> Result<T, EffectError> {
    serde_json::from_value(value).map_err(|e| EffectError::InvalidParameters {
        effect,
        reason: e.to_string(),
    })
}

fn ensure(effect: &'static str, ok: bool, reason: &str) -> Result<(), EffectError> {
    if ok {
        Ok(())
    } else {
        Err(EffectError::InvalidParameters {
            effect,
            reason: reason.to_string(),
        })
    }
}

fn default_one() -> usize {
    1
}

fn default_two() -> usize {
    2
}

fn default_four() -> usize {
    4
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PeriodicParams {
    #[serde(default = "default_one")]
    period: usize,
    #[serde(default)]
    offset: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoveParams {
    #[serde(default = "default_two")]
    period: usize,
    #[serde(default)]
    offset: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RandomizeParams {
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RepeatParams {
    #[serde(default = "default_two")]
    times: usize,
    #[serde(default = "default_one")]
    period: usize,
    #[serde(default)]
    offset: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SwapParams {
    #[serde(default = "default_two")]
    x_period: usize,
    #[serde(default = "default_four")]
    y_period: usize,
    #[serde(default = "default_four")]
    group_size: usize,
    #[serde(default)]
    offset: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CutParams {
    #[serde(default = "default_two")]
    denominator: usize,
    #[serde(default)]
    take_index: usize,
    #[serde(default = "default_one")]
    period: usize,
    #[serde(default)]
    offset: usize,
}

fn build_silence(value: Value) -> Result<Effect, EffectError> {
    let p: PeriodicParams = params("silence", value)?;
    ensure("silence", p.period >= 1, "period must be at least 1")?;
    Ok(Effect::Silence {
        period: p.period,
        offset: p.offset,
    })
}

fn build_remove(value: Value) -> Result<Effect, EffectError> {
    let p: RemoveParams = params("remove", value)?;
    // Period 1 would remove every beat
    ensure("remove", p.period >= 2, "period must be at least 2")?;
    Ok(Effect::Remove {
        period: p.period,
        offset: p.offset,
    })
}

fn build_randomize(value: Value) -> Result<Effect, EffectError> {
    let p: RandomizeParams = params("randomize", value)?;
    Ok(Effect::Randomize { seed: p.seed })
}

fn build_reverse(value: Value) -> Result<Effect, EffectError> {
    let _: NoParams = params("reverse", value)?;
    Ok(Effect::Reverse)
}

fn build_repeat(value: Value) -> Result<Effect, EffectError> {
    let p: RepeatParams = params("repeat", value)?;
    ensure("repeat", p.times >= 1, "times must be at least 1")?;
    ensure("repeat", p.times <= MAX_REPEAT_TIMES, "times must be at most 16")?;
    ensure("repeat", p.period >= 1, "period must be at least 1")?;
    Ok(Effect::Repeat {
        times: p.times,
        period: p.period,
        offset: p.offset,
    })
}

fn build_swap(value: Value) -> Result<Effect, EffectError> {
    let p: SwapParams = params("swap", value)?;
    ensure("swap", p.x_period >= 1 && p.y_period >= 1, "periods must be at least 1")?;
    ensure("swap", p.x_period != p.y_period, "x_period and y_period must differ")?;
    ensure(
        "swap",
        p.x_period <= p.group_size && p.y_period <= p.group_size,
        "periods must not exceed group_size",
    )?;
    Ok(Effect::Swap {
        x_period: p.x_period,
        y_period: p.y_period,
        group_size: p.group_size,
        offset: p.offset,
    })
}

fn build_cut(value: Value) -> Result<Effect, EffectError> {
    let p: CutParams = params("cut", value)?;
    ensure("cut", p.denominator >= 1, "denominator must be at least 1")?;
    ensure("cut", p.take_index < p.denominator, "take_index must be below denominator")?;
    ensure("cut", p.period >= 1, "period must be at least 1")?;
    Ok(Effect::Cut {
        denominator: p.denominator,
        take_index: p.take_index,
        period: p.period,
        offset: p.offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_registered_name_builds_with_defaults() {
        for name in effect_names() {
            let effect = Effect::from_descriptor(&json!({ "type": name }))
                .unwrap_or_else(|e| panic!("{} failed with defaults: {}", name, e));
            assert_eq!(effect.name(), name);
        }
    }

    #[test]
    fn test_swap_with_parameters() {
        let effect =
            Effect::from_descriptor(&json!({"type": "swap", "x_period": 1, "y_period": 3})).unwrap();
        assert_eq!(
            effect,
            Effect::Swap {
                x_period: 1,
                y_period: 3,
                group_size: 4,
                offset: 0
            }
        );
    }

    #[test]
    fn test_unknown_type() {
        let err = Effect::from_descriptor(&json!({"type": "explode"})).unwrap_err();
        assert_eq!(err, EffectError::UnknownType("explode".to_string()));
    }

    #[test]
    fn test_missing_or_non_string_type() {
        assert_eq!(
            Effect::from_descriptor(&json!({"period": 2})).unwrap_err(),
            EffectError::MissingType
        );
        assert_eq!(
            Effect::from_descriptor(&json!({"type": 7})).unwrap_err(),
            EffectError::MissingType
        );
    }

    #[test]
    fn test_non_object_descriptor() {
        assert_eq!(
            Effect::from_descriptor(&json!("reverse")).unwrap_err(),
            EffectError::NotAnObject
        );
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = Effect::from_descriptor(&json!({"type": "reverse", "speed": 2})).unwrap_err();
        assert!(matches!(err, EffectError::InvalidParameters { effect: "reverse", .. }));
    }

    #[test]
    fn test_ill_typed_parameter_rejected() {
        let err = Effect::from_descriptor(&json!({"type": "silence", "period": -1})).unwrap_err();
        assert!(matches!(err, EffectError::InvalidParameters { effect: "silence", .. }));
    }

    #[test]
    fn test_repeat_upper_bound_accepted() {
        let effect =
            Effect::from_descriptor(&json!({"type": "repeat", "times": MAX_REPEAT_TIMES})).unwrap();
        assert!(matches!(effect, Effect::Repeat { times: MAX_REPEAT_TIMES, .. }));
    }

    #[test]
    fn test_parameter_validation() {
        let cases = [
            json!({"type": "remove", "period": 1}),
            json!({"type": "silence", "period": 0}),
            json!({"type": "swap", "x_period": 2, "y_period": 2}),
            json!({"type": "swap", "x_period": 2, "y_period": 5}),
            json!({"type": "cut", "denominator": 2, "take_index": 2}),
            json!({"type": "repeat", "times": 0}),
            json!({"type": "repeat", "times": 17}),
            json!({"type": "repeat", "times": 1u64 << 62}),
        ];

        for descriptor in cases {
            assert!(
                Effect::from_descriptor(&descriptor).is_err(),
                "{} should be rejected",
                descriptor
            );
        }
    }
}
