//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use crate::application::errors::ConfigError;

/// Host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub host: HostConfig,
    pub plugins: PluginConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostConfig {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginConfig {
    pub directory: PathBuf,
    #[serde(default = "default_true")]
    pub auto_enable: bool,
    /// Modules that are loaded but not enabled by `enable_all`
    #[serde(default)]
    pub disabled: Vec<String>,
    /// Per-module settings, keyed by module id
    #[serde(default)]
    pub settings: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub filter: String,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: HostConfig {
                name: "modbay".to_string(),
                prefix: "!".to_string(),
            },
            plugins: PluginConfig {
                directory: PathBuf::from("./plugins"),
                auto_enable: true,
                disabled: Vec::new(),
                settings: HashMap::new(),
            },
            storage: StorageConfig {
                path: PathBuf::from("data/store.json"),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue("host.prefix must not be empty".to_string()));
        }
        if self.plugins.directory.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("plugins.directory must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether configuration keeps `id` from being enabled automatically
    pub fn is_disabled(&self, id: &str) -> bool {
        self.plugins.disabled.iter().any(|d| d == id)
    }

    /// Raw settings section for one module
    pub fn module_settings(&self, id: &str) -> Option<&serde_yaml::Value> {
        self.plugins.settings.get(id)
    }

    pub fn load_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("MODBAY_PLUGIN_DIR") {
            self.plugins.directory = PathBuf::from(dir);
        }

        if let Ok(prefix) = std::env::var("MODBAY_PREFIX") {
            if !prefix.trim().is_empty() {
                self.host.prefix = prefix;
            }
        }

        if let Ok(path) = std::env::var("MODBAY_STORE") {
            self.storage.path = PathBuf::from(path);
        }
    }
}
