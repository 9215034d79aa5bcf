//! Configuration for the engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for batch execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows per batch, fixed for the lifetime of a task
    pub batch_size: usize,

    /// Maximum time for a single rule execution (seconds)
    pub request_timeout_secs: u64,

    /// Log full prompt bodies at debug level
    pub log_prompts: bool,

    /// Log full service replies at debug level
    pub log_responses: bool,
}

impl EngineConfig {
    /// Get the request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            request_timeout_secs: 120,
            log_prompts: false,
            log_responses: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_invalid_batch_size() {
        let config = EngineConfig {
            batch_size: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml("log_prompts = true").unwrap();
        assert!(config.log_prompts);
        assert_eq!(config.request_timeout_secs, 120);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig {
            batch_size: 25,
            ..EngineConfig::default()
        };
        let parsed = EngineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
