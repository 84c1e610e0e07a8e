use std::path::PathBuf;

use config::{Config, File};
pub use config::ConfigError;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::grid::DEFAULT_HISTORY_LIMIT;

/// Process settings
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// HTTP control API
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Where records and the saved grid configuration live
    #[serde(default)]
    pub storage: StorageConfig,
    /// Grid configuration applied at boot, same keys as `POST /api/configure`
    #[serde(default)]
    pub grid: Option<Map<String, Value>>,
    /// Start the grid right after boot when it is configured
    #[serde(default)]
    pub autostart: bool,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Server port (default 5000)
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Server host (default 127.0.0.1)
    #[serde(default = "default_server_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            host: default_server_host(),
        }
    }
}

fn default_server_port() -> u16 {
    5000
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// JSON document holding orders, trades, levels and status
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Saved grid configuration (written with owner-only permissions)
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
    /// Orders and trades kept before the oldest are dropped
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            config_file: default_config_file(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_data_file() -> PathBuf {
    PathBuf::from("greedbot.json")
}

fn default_config_file() -> PathBuf {
    PathBuf::from("bot_config.json")
}

impl Settings {
    /// Load settings from a configuration file
    pub fn new(config_path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_path))
            // Environment overrides the file, e.g. APP__SERVER__PORT=8080
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Settings from the environment alone, for running without a file
    pub fn from_env() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
