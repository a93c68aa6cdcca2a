//! Ordered effect chains

use serde_json::Value;
use thiserror::Error;

use super::effect::{Effect, EffectError};

pub const MIN_EFFECTS: usize = 1;
pub const MAX_EFFECTS: usize = 5;

/// Effect chain construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Not enough effects (min is {})", MIN_EFFECTS)]
    TooFew,

    #[error("Too many effects (max is {})", MAX_EFFECTS)]
    TooMany,

    #[error(transparent)]
    InvalidEffect(#[from] EffectError),
}

/// Non-empty ordered list of effects, applied left to right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectChain(Vec<Effect>);

impl EffectChain {
    pub fn new(effects: Vec<Effect>) -> Result<Self, ChainError> {
        if effects.len() < MIN_EFFECTS {
            return Err(ChainError::TooFew);
        }
        if effects.len() > MAX_EFFECTS {
            return Err(ChainError::TooMany);
        }
        Ok(Self(effects))
    }

    /// Resolve every descriptor, then check the chain length
    ///
    /// A bad descriptor is reported before a bad length.
    pub fn from_descriptors(descriptors: &[Value]) -> Result<Self, ChainError> {
        let effects = descriptors
            .iter()
            .map(Effect::from_descriptor)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(effects)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Effect> {
        self.0.iter()
    }

    /// Effect names in application order, for logging
    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(Effect::name).collect()
    }
}

impl<'a> IntoIterator for &'a EffectChain {
    type Item = &'a Effect;
    type IntoIter = std::slice::Iter<'a, Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
