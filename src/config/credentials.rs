use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::TransmitterError;

/// API credentials for the ingestion service, normally loaded from
/// `credentials.yaml`. Exactly one of `device_id` / `integration_id` must be
/// set; when both are, `integration_id` wins in header selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    /// Base URL of the ingestion service.
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub passkey: String,

    /// Device identity; ignored when `integration_id` is set.
    #[serde(default)]
    pub device_id: String,

    /// Integration identity; wins over `device_id` when both are set.
    #[serde(default)]
    pub integration_id: String,
}

impl Credentials {
    /// Load credentials from a YAML file and validate them.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read credentials file: {}", path.display()))?;

        let credentials: Credentials =
            serde_yaml::from_str(&content).context("Failed to parse credentials YAML")?;

        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.url.is_empty(), "URL not defined"),
            (self.api_key.is_empty(), "apiKey is undefined"),
            (self.passkey.is_empty(), "passkey is undefined"),
            (
                self.device_id.is_empty() && self.integration_id.is_empty(),
                "deviceId or integrationId is undefined",
            ),
        ];

        for (bad, message) in checks {
            if bad {
                return Err(
                    TransmitterError::Config(format!("invalid credentials: {message}")).into(),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Credentials {
        Credentials {
            url: "https://ingest.example.com".to_string(),
            api_key: "key".to_string(),
            passkey: "pass".to_string(),
            device_id: "dev-1".to_string(),
            integration_id: String::new(),
        }
    }

    #[test]
    fn test_valid_credentials_pass() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_url_rejected() {
        let mut credentials = valid();
        credentials.url.clear();
        let err = credentials.validate().unwrap_err();
        assert!(err.to_string().contains("URL not defined"));
    }

    #[test]
    fn test_missing_identity_rejected() {
        let mut credentials = valid();
        credentials.device_id.clear();
        assert!(credentials.validate().is_err());
    }

    #[test]
    fn test_integration_only_is_enough() {
        let mut credentials = valid();
        credentials.device_id.clear();
        credentials.integration_id = "int-1".to_string();
        assert!(credentials.validate().is_ok());
    }

    #[test]
    fn test_config_error_kind() {
        let mut credentials = valid();
        credentials.passkey.clear();
        let err = credentials.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TransmitterError>(),
            Some(TransmitterError::Config(_))
        ));
    }
}
