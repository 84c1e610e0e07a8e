use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};

use crate::bot::start_server;
use crate::config::Settings;
use crate::grid::{BybitGatewayFactory, GridError, GridResult, JsonStore, Supervisor};

/// Runner for the grid bot process
pub struct BotRunner {
    config: Settings,
}

impl BotRunner {
    /// Create a new runner from a configuration file
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
        let path = config_path.as_ref();
        let path = path
            .to_str()
            .ok_or_else(|| config::ConfigError::Message(format!("config path {:?} is not UTF-8", path)))?;
        let config = Settings::new(path)?;
        Ok(Self::with_settings(config))
    }

    /// Create a runner from already loaded settings, trading on Bybit
    pub fn with_settings(config: Settings) -> Self {
        Self { config }
    }

    /// Run the bot until the server stops or Ctrl-C arrives
    pub async fn run(self) -> GridResult<()> {
        // 1. Setup Logging
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&self.config.log.level))
            .try_init()
            .ok();

        info!("Starting BotRunner...");

        // 2. Storage & Supervisor
        let storage = &self.config.storage;
        let store = Arc::new(JsonStore::open(&storage.data_file)?.with_history_limit(storage.history_limit));
        let supervisor = Arc::new(Supervisor::new(
            Arc::new(BybitGatewayFactory),
            store,
            Some(storage.config_file.clone()),
        ));

        // 3. Boot-time grid configuration
        if let Some(raw) = &self.config.grid {
            match supervisor.configure(raw).await {
                Ok(message) => info!("{}", message),
                Err(e) => warn!("Grid configuration from settings rejected: {}", e),
            }
        }

        if self.config.autostart {
            match supervisor.start().await {
                Ok(message) => info!("{}", message),
                Err(GridError::NotConfigured) => warn!("Autostart skipped: bot is not configured"),
                Err(e) => error!("Autostart failed: {}", e),
            }
        }

        // 4. Serve until shutdown
        let server = &self.config.server;
        let result = tokio::select! {
            result = start_server(supervisor.clone(), &server.host, server.port) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
        };

        if supervisor.is_running().await {
            match supervisor.stop().await {
                Ok(message) => info!("{}", message),
                Err(e) => error!("Failed to stop bot: {}", e),
            }
        }

        result
    }
}
