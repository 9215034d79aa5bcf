//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use rowforge_engine::EngineConfig;
use rowforge_llm::ChatConfig;
use rowforge_tasks::{ServiceConfig, TaskLimits};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of imports, exports and checkpoints
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Default log filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Text-generation service
    #[serde(default)]
    pub llm: LlmSettings,

    /// Batch execution
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-task bounds
    #[serde(default)]
    pub limits: TaskLimits,

    /// Output settings
    #[serde(default)]
    pub settings: Settings,
}

/// Text-generation service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Connection settings
    #[serde(flatten)]
    pub chat: ChatConfig,
}

/// Global CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".rowforge").join("config.toml"))
    }

    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the engine and limit settings.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate().map_err(CliError::Config)?;
        self.limits.validate().map_err(CliError::Config)
    }

    /// API key from the configured environment variable, if set.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Task service configuration.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            data_dir: self.data_dir.clone(),
            engine: self.engine.clone(),
            limits: self.limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            llm: LlmSettings::default(),
            engine: EngineConfig::default(),
            limits: TaskLimits::default(),
            settings: Settings::default(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            chat: ChatConfig::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".rowforge").join("data"))
        .unwrap_or_else(|| PathBuf::from("rowforge-data"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_key_env() -> String {
    "ROWFORGE_API_KEY".to_string()
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.llm.api_key_env, "ROWFORGE_API_KEY");
        assert_eq!(config.engine.batch_size, 10);
        assert!(config.settings.color);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/srv/rowforge"

            [llm]
            model = "deepseek-chat"
            endpoint = "https://api.example.com/v1/chat/completions"
            api_key_env = "DEEPSEEK_KEY"

            [engine]
            batch_size = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/rowforge"));
        assert_eq!(config.llm.chat.model, "deepseek-chat");
        assert_eq!(config.llm.api_key_env, "DEEPSEEK_KEY");
        assert_eq!(config.llm.chat.max_retries, ChatConfig::default().max_retries);
        assert_eq!(config.engine.batch_size, 25);
        assert_eq!(config.engine.request_timeout_secs, 120);
        assert_eq!(config.limits, TaskLimits::default());
    }

    #[test]
    fn test_written_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.data_dir = dir.path().join("data");
        config.settings.format = OutputFormat::Json;

        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_engine_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine]\nbatch_size = 0\n").unwrap();
        assert!(matches!(Config::load(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_service_config() {
        let mut config = Config::default();
        config.data_dir = PathBuf::from("/data");
        let service = config.service_config();
        assert_eq!(service.data_dir, PathBuf::from("/data"));
        assert_eq!(service.engine, config.engine);
    }
}
