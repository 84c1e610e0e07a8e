//! Bot lifecycle - configure, start, stop and the polling loop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::config::GridConfig;
use super::control::StatusSnapshot;
use super::engine::GridEngine;
use super::errors::{GridError, GridResult};
use super::executor::{ExchangeGateway, GatewayFactory};
use super::persistence::PersistenceSink;
use super::types::{BotStatusRecord, EngineSnapshot};

/// Half-width of an auto-adjusted range, as a fraction of the price
const AUTO_RANGE_FRACTION: f64 = 0.05;
/// Every this many cycles the loop logs a summary and refreshes the price
const STATUS_EVERY: u64 = 6;
/// How long `stop` waits for the loop task to exit
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A started grid: the engine plus the task polling it
struct ActiveRun {
    /// Run copy of the config, range possibly auto-adjusted
    config: GridConfig,
    engine: Arc<Mutex<GridEngine>>,
    /// Counts published after every cycle; readers never wait on the engine
    snapshot_rx: watch::Receiver<EngineSnapshot>,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SupervisorState {
    config: Option<GridConfig>,
    run: Option<ActiveRun>,
}

/// Owns the bot lifecycle
///
/// Unconfigured → Configured → Running → Configured. All control calls
/// serialize on one lock. While running, a spawned task reconciles the
/// engine every `check_interval` seconds, so fills are seen at most one
/// interval late.
pub struct Supervisor {
    factory: Arc<dyn GatewayFactory>,
    sink: Arc<dyn PersistenceSink>,
    config_path: Option<PathBuf>,
    state: Mutex<SupervisorState>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl Supervisor {
    /// Create a supervisor, reloading a saved config from `config_path`
    pub fn new(
        factory: Arc<dyn GatewayFactory>,
        sink: Arc<dyn PersistenceSink>,
        config_path: Option<PathBuf>,
    ) -> Self {
        let mut state = SupervisorState::default();

        if let Some(path) = config_path.as_ref().filter(|p| p.exists()) {
            match GridConfig::load_from_file(path) {
                Ok(config) => {
                    info!("Configuration loaded from {:?}: {:?}", path, config.redacted());
                    state.config = Some(config);
                }
                Err(e) => warn!("Ignoring saved configuration {:?}: {}", path, e),
            }
        }

        Self {
            factory,
            sink,
            config_path,
            state: Mutex::new(state),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn sink(&self) -> Arc<dyn PersistenceSink> {
        self.sink.clone()
    }

    /// Validate and store a configuration
    ///
    /// A rejected configuration leaves the previous one in place.
    pub async fn configure(&self, raw: &Map<String, Value>) -> GridResult<String> {
        let mut state = self.state.lock().await;
        if state.run.is_some() {
            return Err(GridError::AlreadyRunning);
        }

        let config = GridConfig::from_raw(raw)?;

        if let Some(path) = &self.config_path {
            match config.save_to_file(path) {
                Ok(()) => info!("Configuration saved to {:?}", path),
                Err(e) => error!("Failed to save configuration to {:?}: {}", path, e),
            }
        }

        if let Err(e) = self.sink.record_status(&status_record(&config, false, None)).await {
            warn!("Failed to persist status: {}", e);
        }

        info!("Bot configured: {:?}", config.redacted());
        state.config = Some(config);
        Ok("Configuration saved".to_string())
    }

    /// Connect, seed the grid and start the polling loop
    pub async fn start(&self) -> GridResult<String> {
        let mut state = self.state.lock().await;
        if state.run.is_some() {
            return Err(GridError::AlreadyRunning);
        }
        let config = state.config.clone().ok_or(GridError::NotConfigured)?;

        let gateway = self
            .factory
            .connect(&config)
            .map_err(|e| GridError::Connection(e.to_string()))?;

        let current_price = fetch_price(gateway.as_ref(), &config)
            .await
            .map_err(|e| GridError::Connection(format!("Failed to connect to Bybit: {}", e)))?;
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(GridError::Connection(format!(
                "exchange returned unusable price {}",
                current_price
            )));
        }
        info!("Current price for {}: {}", config.symbol, current_price);

        let auto_adjusted = !config.is_price_in_range(current_price);
        let run_config = if auto_adjusted {
            let lower = config.round_price(current_price * (1.0 - AUTO_RANGE_FRACTION));
            let upper = config.round_price(current_price * (1.0 + AUTO_RANGE_FRACTION));
            info!(
                "Auto-adjusted grid range from ${}-${} to ${}-${} based on current price ${}",
                config.grid_lower, config.grid_upper, lower, upper, current_price
            );
            let adjusted = config.with_range(lower, upper);
            adjusted.validate().map_err(|e| {
                GridError::Initialization(format!(
                    "auto-adjusted range {}-{} around price {} cannot hold {} levels at price_decimals {}: {}",
                    lower, upper, current_price, config.grid_levels, config.price_decimals, e
                ))
            })?;
            adjusted
        } else {
            config.clone()
        };

        let mut engine = GridEngine::new(run_config.clone(), gateway.clone(), self.sink.clone())?;
        let summary = engine.initialize(current_price).await?;
        if summary.placed() == 0 {
            warn!("Grid started without any resting orders");
        }

        *self.last_error.write().await = None;

        let (snapshot_tx, snapshot_rx) = watch::channel(engine.status());
        let engine = Arc::new(Mutex::new(engine));
        let (stop_tx, stop_rx) = watch::channel(false);
        let polling = PollingLoop {
            config: run_config.clone(),
            engine: engine.clone(),
            snapshot_tx,
            gateway,
            sink: self.sink.clone(),
            last_error: self.last_error.clone(),
        };
        let handle = tokio::spawn(polling.run(stop_rx));

        if let Err(e) = self
            .sink
            .record_status(&status_record(&run_config, true, Some(current_price)))
            .await
        {
            warn!("Failed to persist status: {}", e);
        }

        let mut message = "Bot started successfully".to_string();
        if auto_adjusted {
            message.push_str(&format!(
                ". Grid range auto-adjusted to {}-{} (±5% of current price {})",
                format_usd(run_config.grid_lower),
                format_usd(run_config.grid_upper),
                format_usd(current_price)
            ));
        }

        state.run = Some(ActiveRun {
            config: run_config,
            engine,
            snapshot_rx,
            stop_tx,
            handle,
        });

        info!("Bot started successfully");
        Ok(message)
    }

    /// Cancel the grid and stop the polling loop
    pub async fn stop(&self) -> GridResult<String> {
        let mut state = self.state.lock().await;
        let mut run = state.run.take().ok_or(GridError::NotRunning)?;

        // Receiver may already be gone if the task ended
        let _ = run.stop_tx.send(true);

        if let Err(e) = run.engine.lock().await.shutdown().await {
            error!("Error shutting down grid: {}", e);
        }

        match tokio::time::timeout(STOP_JOIN_TIMEOUT, &mut run.handle).await {
            Ok(Ok(())) => debug!("Polling loop joined"),
            Ok(Err(e)) => error!("Polling loop ended abnormally: {}", e),
            Err(_) => warn!(
                "Polling loop still draining after {}s",
                STOP_JOIN_TIMEOUT.as_secs()
            ),
        }

        if let Err(e) = self
            .sink
            .record_status(&status_record(&run.config, false, None))
            .await
        {
            warn!("Failed to persist status: {}", e);
        }

        info!("Bot stopped successfully");
        Ok("Bot stopped successfully".to_string())
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.run.is_some()
    }

    /// Lifecycle flags, config and the last published engine counts
    ///
    /// Never waits for an in-flight reconcile cycle.
    pub async fn status(&self) -> StatusSnapshot {
        let state = self.state.lock().await;
        let error = self.last_error.read().await.clone();

        let (config, engine) = match &state.run {
            Some(run) => (
                Some(run.config.redacted()),
                Some(run.snapshot_rx.borrow().clone()),
            ),
            None => (state.config.as_ref().map(GridConfig::redacted), None),
        };

        StatusSnapshot {
            running: state.run.is_some(),
            configured: state.config.is_some(),
            error,
            config,
            engine,
        }
    }

    /// Order-book counts of the running engine
    pub async fn engine_snapshot(&self) -> Option<EngineSnapshot> {
        let state = self.state.lock().await;
        state.run.as_ref().map(|run| run.snapshot_rx.borrow().clone())
    }
}

/// Everything the spawned loop needs, detached from the supervisor lock
struct PollingLoop {
    config: GridConfig,
    engine: Arc<Mutex<GridEngine>>,
    snapshot_tx: watch::Sender<EngineSnapshot>,
    gateway: Arc<dyn ExchangeGateway>,
    sink: Arc<dyn PersistenceSink>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl PollingLoop {
    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        info!("Bot loop started");
        let interval = self.config.check_interval();
        let mut iteration: u64 = 0;

        loop {
            if *stop_rx.borrow() {
                break;
            }
            iteration += 1;

            let outcome = {
                let mut engine = self.engine.lock().await;
                // stop may have shut the engine down while we waited
                if *stop_rx.borrow() {
                    break;
                }
                let outcome = engine.reconcile().await;
                self.snapshot_tx.send_replace(engine.status());
                outcome
            };

            match outcome {
                Ok(report) => {
                    if !report.filled.is_empty() {
                        debug!(
                            "Cycle {}: {} filled, {} replaced",
                            iteration,
                            report.filled.len(),
                            report.placed.len()
                        );
                    }
                    *self.last_error.write().await = None;
                }
                Err(e) => {
                    error!("Error in bot loop: {}", e);
                    *self.last_error.write().await = Some(e.to_string());
                }
            }

            if iteration % STATUS_EVERY == 0 {
                self.report_status().await;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Bot loop ended");
    }

    /// Log a summary and persist the latest price
    async fn report_status(&self) {
        let snapshot = self.snapshot_tx.borrow().clone();
        info!(
            "Status: {} buy orders, {} sell orders, {} filled orders",
            snapshot.active_buys, snapshot.active_sells, snapshot.filled_orders
        );

        match fetch_price(self.gateway.as_ref(), &self.config).await {
            Ok(price) => {
                let record = status_record(&self.config, true, Some(price));
                if let Err(e) = self.sink.record_status(&record).await {
                    warn!("Failed to persist status: {}", e);
                }
            }
            Err(e) => warn!("Failed to refresh price: {}", e),
        }
    }
}

async fn fetch_price(gateway: &dyn ExchangeGateway, config: &GridConfig) -> GridResult<f64> {
    match tokio::time::timeout(
        config.request_timeout(),
        gateway.ticker_price(&config.symbol, config.category),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(GridError::Timeout(config.request_timeout_secs)),
    }
}

fn status_record(config: &GridConfig, is_running: bool, current_price: Option<f64>) -> BotStatusRecord {
    BotStatusRecord {
        is_running,
        symbol: config.symbol.clone(),
        category: config.category,
        grid_levels: config.grid_levels,
        grid_lower: config.grid_lower,
        grid_upper: config.grid_upper,
        order_amount: config.order_amount,
        current_price,
        updated_at: Utc::now(),
    }
}

/// `$1,234.50` style formatting
fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use crate::grid::errors::ErrorKind;
    use crate::grid::executor::mock::{MockExchange, MockGatewayFactory};
    use crate::grid::persistence::JsonStore;
    use crate::grid::types::OrderSide;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn valid_raw() -> Map<String, Value> {
        raw(json!({
            "api_key": "key",
            "api_secret": "secret",
            "symbol": "BTCUSDT",
            "grid_levels": 5,
            "grid_lower": 100,
            "grid_upper": 200,
            "order_amount": "0.1",
            "check_interval": 0.02,
            "placement_delay_ms": 0,
            "request_timeout_secs": 1
        }))
    }

    fn supervisor(price: f64) -> (Supervisor, Arc<MockExchange>, Arc<JsonStore>) {
        let exchange = Arc::new(MockExchange::new(price));
        let store = Arc::new(JsonStore::in_memory());
        let supervisor = Supervisor::new(
            Arc::new(MockGatewayFactory::new(exchange.clone())),
            store.clone(),
            None,
        );
        (supervisor, exchange, store)
    }

    #[tokio::test]
    async fn test_configure_rejections_keep_prior_config() {
        let (supervisor, _, _) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();

        let mut bad = valid_raw();
        bad.insert("grid_lower".into(), json!(300));
        let err = supervisor.configure(&bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut bad = valid_raw();
        bad.insert("grid_levels".into(), json!(1));
        assert!(supervisor.configure(&bad).await.is_err());

        let mut bad = valid_raw();
        bad.insert("order_amount".into(), json!(0));
        assert!(supervisor.configure(&bad).await.is_err());

        let status = supervisor.status().await;
        assert!(status.configured);
        let config = status.config.unwrap();
        assert_eq!(config.grid_lower, 100.0);
        assert_eq!(config.grid_levels, 5);
        assert_eq!(config.order_amount, 0.1);
    }

    #[tokio::test]
    async fn test_configure_rejects_unbounded_interval_and_levels() {
        let (supervisor, _, _) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();

        let mut bad = valid_raw();
        bad.insert("check_interval".into(), json!(1e20));
        match supervisor.configure(&bad).await {
            Err(GridError::Validation { field, .. }) => assert_eq!(field, "check_interval"),
            other => panic!("unexpected: {:?}", other),
        }

        let mut bad = valid_raw();
        bad.insert("grid_levels".into(), json!(4_000_000_000u64));
        match supervisor.configure(&bad).await {
            Err(GridError::Validation { field, .. }) => assert_eq!(field, "grid_levels"),
            other => panic!("unexpected: {:?}", other),
        }

        let config = supervisor.status().await.config.unwrap();
        assert_eq!(config.check_interval, 0.02);
        assert_eq!(config.grid_levels, 5);
    }

    #[tokio::test]
    async fn test_configure_names_every_missing_field() {
        let (supervisor, _, _) = supervisor(150.0);
        let mut partial = valid_raw();
        partial.remove("api_secret");
        partial.remove("grid_upper");

        match supervisor.configure(&partial).await {
            Err(GridError::Validation { field, .. }) => {
                assert!(field.contains("api_secret"));
                assert!(field.contains("grid_upper"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!supervisor.status().await.configured);
    }

    #[tokio::test]
    async fn test_configure_records_idle_status() {
        let (supervisor, _, store) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();

        let status = store.latest_status().await.unwrap().unwrap();
        assert!(!status.is_running);
        assert_eq!(status.symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn test_start_requires_configuration() {
        let (supervisor, _, _) = supervisor(150.0);
        assert!(matches!(supervisor.start().await, Err(GridError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_start_outside_range_adjusts_run_range() {
        let (supervisor, exchange, store) = supervisor(230.0);
        supervisor.configure(&valid_raw()).await.unwrap();

        let message = supervisor.start().await.unwrap();
        assert_eq!(
            message,
            "Bot started successfully. Grid range auto-adjusted to $218.50-$241.50 (±5% of current price $230.00)"
        );

        let placed = exchange.placed_snapshot().await;
        assert!(!placed.is_empty());
        assert!(placed.iter().all(|o| o.price.unwrap() <= 241.5));
        assert!(placed.iter().all(|o| o.price.unwrap() >= 218.5));

        let status = supervisor.status().await;
        assert!(status.running);
        let config = status.config.unwrap();
        assert_eq!((config.grid_lower, config.grid_upper), (218.5, 241.5));

        let persisted = store.latest_status().await.unwrap().unwrap();
        assert!(persisted.is_running);
        assert_eq!(persisted.current_price, Some(230.0));
        assert_eq!(persisted.grid_lower, 218.5);

        supervisor.stop().await.unwrap();
        // the configured range is kept for the next start
        let config = supervisor.status().await.config.unwrap();
        assert_eq!((config.grid_lower, config.grid_upper), (100.0, 200.0));
    }

    #[tokio::test]
    async fn test_sub_tick_auto_adjust_is_initialization_error() {
        // ±5% of 0.20 at two decimals leaves two ticks for four steps
        let (supervisor, exchange, _) = supervisor(0.2);
        supervisor.configure(&valid_raw()).await.unwrap();

        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, GridError::Initialization(_)));
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert!(err.to_string().contains("price_decimals 2"));
        assert!(!supervisor.is_running().await);
        assert!(exchange.placed_snapshot().await.is_empty());

        // a finer precision lets the same price start
        let mut finer = valid_raw();
        finer.insert("price_decimals".into(), json!(4));
        supervisor.configure(&finer).await.unwrap();
        supervisor.start().await.unwrap();
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_inside_range_keeps_range() {
        let (supervisor, exchange, _) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();

        assert_eq!(supervisor.start().await.unwrap(), "Bot started successfully");
        assert_eq!(exchange.placed_snapshot().await.len(), 4);

        let engine = supervisor.engine_snapshot().await.unwrap();
        assert_eq!(engine.active_buys, 2);
        assert_eq!(engine.active_sells, 2);
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_lifecycle_errors_while_running() {
        let (supervisor, _, _) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();
        supervisor.start().await.unwrap();

        assert!(matches!(supervisor.start().await, Err(GridError::AlreadyRunning)));
        assert!(matches!(
            supervisor.configure(&valid_raw()).await,
            Err(GridError::AlreadyRunning)
        ));
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_ticker_failure_is_connection_error() {
        let (supervisor, exchange, _) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();
        exchange.set_price(None).await;

        let err = supervisor.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(!supervisor.is_running().await);
        assert!(exchange.placed_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_when_not_running_leaves_status() {
        let (supervisor, _, store) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();
        let before = store.latest_status().await.unwrap();

        let err = supervisor.stop().await.unwrap_err();
        assert!(matches!(err, GridError::NotRunning));
        assert_eq!(err.kind(), ErrorKind::Lifecycle);
        assert_eq!(store.latest_status().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_stop_cancels_orders() {
        let (supervisor, exchange, store) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();
        supervisor.start().await.unwrap();
        assert_eq!(exchange.open_snapshot().await.len(), 4);

        assert_eq!(supervisor.stop().await.unwrap(), "Bot stopped successfully");
        assert!(exchange.open_snapshot().await.is_empty());

        let status = supervisor.status().await;
        assert!(!status.running);
        assert!(status.configured);
        assert!(status.engine.is_none());
        assert!(!store.latest_status().await.unwrap().unwrap().is_running);

        // and it can start again
        supervisor.start().await.unwrap();
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_cycle_error_does_not_stop_loop() {
        let (supervisor, exchange, _) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();
        supervisor.start().await.unwrap();

        exchange.set_fail_open_orders(true).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        let status = supervisor.status().await;
        assert!(status.running);
        assert!(status.error.is_some());

        let calls = exchange.open_orders_calls.load(Ordering::SeqCst);
        exchange.set_fail_open_orders(false).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(exchange.open_orders_calls.load(Ordering::SeqCst) > calls);
        assert!(supervisor.status().await.error.is_none());

        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_does_not_wait_for_slow_cycle() {
        let (supervisor, exchange, _) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();
        supervisor.start().await.unwrap();

        exchange.set_open_orders_delay(Some(Duration::from_millis(800))).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // the loop is now parked inside reconcile holding the engine
        let status = tokio::time::timeout(Duration::from_millis(200), supervisor.status())
            .await
            .expect("status blocked on the engine");
        assert!(status.running);
        assert_eq!(status.engine.unwrap().active_buys, 2);

        let engine = tokio::time::timeout(Duration::from_millis(200), supervisor.engine_snapshot())
            .await
            .expect("engine snapshot blocked on the engine");
        assert_eq!(engine.unwrap().active_sells, 2);

        exchange.set_open_orders_delay(None).await;
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_loop_replaces_fills() {
        let (supervisor, exchange, store) = supervisor(150.0);
        supervisor.configure(&valid_raw()).await.unwrap();
        supervisor.start().await.unwrap();

        exchange.fill_at(OrderSide::Buy, 125.0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let open = exchange.open_snapshot().await;
        assert!(open.iter().any(|o| o.side == OrderSide::Sell && o.price == 150.0));
        assert_eq!(store.recent_trades(10).await.unwrap().len(), 1);
        assert_eq!(supervisor.engine_snapshot().await.unwrap().filled_orders, 1);

        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_config_file_reloaded_on_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot_config.json");
        let exchange = Arc::new(MockExchange::new(150.0));
        let store: Arc<JsonStore> = Arc::new(JsonStore::in_memory());

        let first = Supervisor::new(
            Arc::new(MockGatewayFactory::new(exchange.clone())),
            store.clone(),
            Some(path.clone()),
        );
        first.configure(&valid_raw()).await.unwrap();
        assert!(path.exists());

        let second = Supervisor::new(
            Arc::new(MockGatewayFactory::new(exchange)),
            store,
            Some(path),
        );
        let status = second.status().await;
        assert!(status.configured);
        assert_eq!(status.config.unwrap().symbol, "BTCUSDT");
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(218.5), "$218.50");
        assert_eq!(format_usd(64_321.456), "$64,321.46");
        assert_eq!(format_usd(1_234_567.0), "$1,234,567.00");
        assert_eq!(format_usd(0.5), "$0.50");
    }
}
