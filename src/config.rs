use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::quality::{
    DocumentQualityAssessor, GateError, GateLimits, ImageQualityGate, ProfilePreset,
    QualityProfile,
};

/// Application-level constants
pub const APP_NAME: &str = "docgate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset
pub fn default_log_filter() -> &'static str {
    "docgate=info"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid gate configuration: {0}")]
    Gate(#[from] GateError),
}

/// Either a named preset or a fully spelled-out profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileSetting {
    Preset(ProfilePreset),
    Custom(QualityProfile),
}

impl ProfileSetting {
    pub fn resolve(&self) -> QualityProfile {
        match self {
            Self::Preset(preset) => QualityProfile::from_preset(*preset),
            Self::Custom(profile) => profile.clone(),
        }
    }
}

/// Gate configuration as read from a JSON file.
///
/// `profile` has no default: a deployment must say which one it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub profile: ProfileSetting,
    #[serde(default)]
    pub limits: GateLimits,
}

impl GateConfig {
    pub fn from_preset(preset: ProfilePreset) -> Self {
        Self {
            profile: ProfileSetting::Preset(preset),
            limits: GateLimits::default(),
        }
    }

    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.display(), "Loaded gate configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.profile.resolve().validate()?;
        if self.limits.max_image_bytes == 0 || self.limits.max_dimension == 0 {
            let err = GateError::InvalidLimits("limits must be greater than zero".into());
            return Err(err.into());
        }
        Ok(())
    }

    pub fn build_gate(&self) -> Result<ImageQualityGate, ConfigError> {
        self.validate()?;
        let gate = ImageQualityGate::new(
            Box::new(DocumentQualityAssessor),
            self.profile.resolve(),
            self.limits,
        )?;
        Ok(gate)
    }
}
