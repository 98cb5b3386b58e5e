use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_PROFILE};
use crate::errors::TransmitterError;

/// Per-client transmitter settings, normally loaded from `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server-side grouping string selecting the ingestion pipeline.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Log transfer destinations at debug detail.
    #[serde(default)]
    pub debug: bool,

    /// Disable TLS certificate verification on the HTTP clients this library
    /// owns. Never affects transports outside this crate.
    #[serde(default, rename = "insecure")]
    pub allow_insecure_tls: bool,

    /// Whole-upload retry budget; zero is coerced to the default of 3.
    #[serde(default)]
    pub max_retries: usize,
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            debug: false,
            allow_insecure_tls: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file and validate them.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read settings file: {}", path.display()))?;

        let mut settings: Settings =
            serde_yaml::from_str(&content).context("Failed to parse settings YAML")?;

        settings.validate()?;
        settings.normalize();
        Ok(settings)
    }

    /// Apply the documented defaults: empty profile becomes `"default"`, a
    /// zero retry budget becomes 3.
    pub fn normalize(&mut self) {
        if self.profile.is_empty() {
            self.profile = DEFAULT_PROFILE.to_string();
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.profile.is_empty() {
            return Err(TransmitterError::Config(
                "invalid settings: no profile defined, example 'default'".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
