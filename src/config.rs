use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Knobs of the selection pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Select the first entry whose accept box contains the problem without
    /// scoring the rest. When off, accepted entries are scored like any other.
    pub accept_short_circuit: bool,
    /// Retry with alignment-fallback (`#`) entries when nothing else is eligible.
    pub align_fallback: bool,
    /// Keep per-entry rejection reasons in the outcome.
    pub record_rejections: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            accept_short_circuit: true,
            align_fallback: true,
            record_rejections: true,
        }
    }
}

impl EvaluatorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
