//! Engine configuration.
//!
//! Only the retry schedule and the type lookup order are tunable. The
//! packing budget belongs to the remote service and lives in
//! [`crate::packer`] as constants.

use std::fs;
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::retry::BackoffSettings;
use crate::types::PolicyType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backoff: BackoffSettings,
    /// Order in which policy types are tried for references without a type hint.
    pub types_to_try: Vec<PolicyType>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            backoff: BackoffSettings::default(),
            types_to_try: vec![PolicyType::Custom, PolicyType::System],
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration. Missing keys take defaults.
    pub fn from_json_str(text: &str) -> Result<Self, PolicyError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            PolicyError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.backoff.max_elapsed_ms == 0 {
            return Err(PolicyError::InvalidConfig(
                "backoff.max_elapsed_ms must be greater than zero".to_string(),
            ));
        }
        if self.backoff.multiplier.is_nan() || self.backoff.multiplier < 1.0 {
            return Err(PolicyError::InvalidConfig(format!(
                "backoff.multiplier must be at least 1.0, got {}",
                self.backoff.multiplier
            )));
        }
        if self.backoff.max_interval_ms == 0 {
            return Err(PolicyError::InvalidConfig(
                "backoff.max_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.backoff.initial_interval_ms > self.backoff.max_interval_ms {
            return Err(PolicyError::InvalidConfig(
                "backoff.initial_interval_ms exceeds backoff.max_interval_ms".to_string(),
            ));
        }
        if self.types_to_try.is_empty() {
            return Err(PolicyError::InvalidConfig(
                "types_to_try must name at least one policy type".to_string(),
            ));
        }
        if !self.types_to_try.iter().all_unique() {
            return Err(PolicyError::InvalidConfig(format!(
                "types_to_try contains duplicates: [{}]",
                self.types_to_try.iter().join(", ")
            )));
        }
        Ok(())
    }
}
