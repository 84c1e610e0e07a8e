//! Grid Trading Module for Bybit
//!
//! Keeps resting buy and sell limit orders on evenly spaced price levels and
//! replaces each fill with an order on the opposite side one level away.
//!
//! # Architecture
//!
//! - [`config`] - Grid configuration and validation
//! - [`types`] - Order, trade and status records
//! - [`errors`] - Grid-specific error types
//! - [`strategy`] - Level calculation and replacement placement
//! - [`executor`] - Exchange abstraction (mockable for testing)
//! - [`bybit`] - Bybit v5 REST gateway
//! - [`persistence`] - Order/trade/status storage
//! - [`engine`] - Per-run grid state machine
//! - [`supervisor`] - Lifecycle and polling loop
//! - [`control`] - Responses returned to callers
//!
//! # Fill detection
//!
//! Fills are found by polling: every `check_interval` seconds the engine
//! compares its active orders with the exchange's open orders, and any that
//! vanished are treated as filled. A fill is therefore acted on up to one
//! interval after it happens.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use greed_bot::grid::{BybitGatewayFactory, JsonStore, Supervisor};
//!
//! let store = Arc::new(JsonStore::open("greedbot.json")?);
//! let supervisor = Supervisor::new(Arc::new(BybitGatewayFactory), store, None);
//!
//! let raw = serde_json::json!({
//!     "api_key": "...", "api_secret": "...", "symbol": "BTCUSDT",
//!     "grid_levels": 10, "grid_lower": 60000, "grid_upper": 70000,
//!     "order_amount": 0.001,
//! });
//! supervisor.configure(raw.as_object().unwrap()).await?;
//! println!("{}", supervisor.start().await?);
//! ```
//!
//! # Testing
//!
//! ```rust,ignore
//! use greed_bot::grid::executor::mock::{MockExchange, MockGatewayFactory};
//!
//! let exchange = Arc::new(MockExchange::new(150.0));
//! let factory = MockGatewayFactory::new(exchange.clone());
//! exchange.fill_at(OrderSide::Buy, 125.0).await;
//! ```

pub mod bybit;
pub mod config;
pub mod control;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod persistence;
pub mod strategy;
pub mod supervisor;
pub mod types;

// Re-export commonly used types
pub use bybit::BybitGateway;
pub use config::{
    BoundaryPolicy, Credentials, GridConfig, MarketCategory, RedactedConfig, MAX_CHECK_INTERVAL_SECS,
    MAX_GRID_LEVELS,
};
pub use control::{ControlResponse, Dashboard, ResponseStatus, StatusSnapshot, TradeSummary};
pub use engine::{GridEngine, InitSummary, ReconcileReport};
pub use errors::{ErrorKind, GridError, GridResult};
pub use executor::{BybitGatewayFactory, ExchangeGateway, GatewayFactory};
pub use persistence::{JsonStore, PersistenceSink, DEFAULT_HISTORY_LIMIT};
pub use strategy::{compute_levels, GridLevels, Replacement};
pub use supervisor::Supervisor;
pub use types::{
    BotStatusRecord, EngineSnapshot, GridLevelRecord, OpenOrder, OrderRecord, OrderRef,
    OrderRequest, OrderSide, OrderState, OrderType, TradeRecord,
};
