//! Request models: effects, effect chains and tuning settings
//!
//! Everything here is validated on construction, so the pipeline only ever
//! sees well-formed values.

pub mod effect;
pub mod effect_chain;
pub mod settings;

pub use effect::{effect_names, Effect, EffectError, MAX_REPEAT_TIMES};
pub use effect_chain::{ChainError, EffectChain, MAX_EFFECTS, MIN_EFFECTS};
pub use settings::{BpmWindow, ProcessingSettings, SettingsError};
