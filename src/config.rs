// ⚙️ Configuration
//
// nuban.toml, every key optional:
//
//   [storage]    db_path
//   [history]    max_generations, max_validations
//   [server]     listen
//   [directory]  csv_path
//   [logging]    level

use crate::entities::bank::BankDirectory;
use crate::history::{DEFAULT_MAX_GENERATIONS, DEFAULT_MAX_VALIDATIONS};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Env var naming the config file when no --config flag is given
pub const CONFIG_ENV: &str = "NUBAN_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file; None keeps history in memory only
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_generations")]
    pub max_generations: usize,
    #[serde(default = "default_max_validations")]
    pub max_validations: usize,
}

fn default_max_generations() -> usize {
    DEFAULT_MAX_GENERATIONS
}

fn default_max_validations() -> usize {
    DEFAULT_MAX_VALIDATIONS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
            max_validations: default_max_validations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// CSV bank list; None uses the built-in CBN directory
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path, else $NUBAN_CONFIG, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_generations == 0 || self.history.max_validations == 0 {
            return Err(ConfigError::Validation(
                "history limits must be at least 1".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level is empty".to_string()));
        }
        Ok(())
    }

    /// The configured bank directory (CSV file or built-in list)
    pub fn bank_directory(&self) -> anyhow::Result<BankDirectory> {
        match &self.directory.csv_path {
            Some(path) => BankDirectory::from_csv(path),
            None => Ok(BankDirectory::nigerian_banks()),
        }
    }
}
