//! Grid Trading Bot Binary
//!
//! Runs the Bybit grid bot with its HTTP control API.
//!
//! ## Setup
//!
//! 1. Optionally create a `.env` file in the project root with overrides:
//!    ```text
//!    APP__SERVER__PORT=5000
//!    APP__LOG__LEVEL=debug
//!    ```
//!
//! 2. Run the bot:
//!    ```bash
//!    cargo run --bin grid_bot -- --config config.toml
//!    ```
//!
//! 3. Configure and start it over HTTP (`POST /api/configure`, `POST /api/start`).

use std::env;
use std::process::ExitCode;

use log::error;

use greed_bot::config::Settings;
use greed_bot::runner::BotRunner;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (settings are read from APP__* variables)
    dotenvy::dotenv().ok();

    // Parse arguments
    let args: Vec<String> = env::args().collect();
    let runner = if args.len() > 2 && args[1] == "--config" {
        BotRunner::new(&args[2])
    } else {
        Settings::from_env().map(BotRunner::with_settings)
    };

    let runner = match runner {
        Ok(runner) => runner,
        Err(e) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .try_init()
                .ok();
            error!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runner.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Bot exited with error: {}", e);
            ExitCode::FAILURE
        }
    }
}
