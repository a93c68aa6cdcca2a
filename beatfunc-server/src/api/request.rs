//! Effect and settings payload parsing shared by both processing endpoints

use serde_json::Value;

use crate::error::ApiError;
use crate::models::{BpmWindow, EffectChain, ProcessingSettings};

/// Validated processing request
#[derive(Debug, Clone)]
pub struct EffectRequest {
    pub chain: EffectChain,
    pub window: BpmWindow,
}

impl EffectRequest {
    /// Build from an effect list and optional settings object
    pub fn from_parts(effects: &Value, settings: Option<&Value>) -> Result<Self, ApiError> {
        let descriptors = effects
            .as_array()
            .ok_or_else(|| ApiError::bad_request("Invalid effects"))?;
        let chain = EffectChain::from_descriptors(descriptors)?;
        let window = parse_settings(settings)?.bpm_window()?;

        Ok(Self { chain, window })
    }

    /// Parse the multipart `effects` field
    ///
    /// Accepts a bare list of descriptors or `{"effects": [...], "settings": {...}}`.
    pub fn from_form_field(text: &str) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            tracing::debug!(error = %e, "effects field is not JSON");
            ApiError::bad_request("Invalid effects")
        })?;

        match value {
            Value::Array(_) => Self::from_parts(&value, None),
            Value::Object(ref map) => {
                let effects = map
                    .get("effects")
                    .ok_or_else(|| ApiError::bad_request("Missing effects"))?;
                Self::from_parts(effects, map.get("settings"))
            }
            _ => Err(ApiError::bad_request("Invalid effects")),
        }
    }
}

fn parse_settings(settings: Option<&Value>) -> Result<ProcessingSettings, ApiError> {
    match settings {
        None | Some(Value::Null) => Ok(ProcessingSettings::default()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            tracing::debug!(error = %e, "settings rejected");
            ApiError::bad_request("Invalid settings")
        }),
    }
}
