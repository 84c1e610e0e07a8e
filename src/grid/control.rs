//! Request/response contract of the control surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::RedactedConfig;
use super::errors::{ErrorKind, GridResult};
use super::types::{BotStatusRecord, EngineSnapshot, GridLevelRecord, OrderRecord, OrderSide, TradeRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Answer to configure, start and stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: ResponseStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ControlResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            kind: None,
        }
    }

    pub fn from_result(result: GridResult<String>) -> Self {
        match result {
            Ok(message) => Self::success(message),
            Err(e) => Self {
                status: ResponseStatus::Error,
                message: e.to_string(),
                kind: Some(e.kind()),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

/// Supervisor state as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub configured: bool,
    /// Last polling-loop error, cleared by the next good cycle
    pub error: Option<String>,
    /// Active config without credentials
    pub config: Option<RedactedConfig>,
    pub engine: Option<EngineSnapshot>,
}

/// Totals over the recorded trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub total_trades: usize,
    pub buy_trades: usize,
    pub sell_trades: usize,
    /// Notional traded, quote currency
    pub total_volume: f64,
}

impl TradeSummary {
    pub fn from_trades(trades: &[TradeRecord]) -> Self {
        trades.iter().fold(Self::default(), |mut summary, trade| {
            summary.total_trades += 1;
            match trade.side {
                OrderSide::Buy => summary.buy_trades += 1,
                OrderSide::Sell => summary.sell_trades += 1,
            }
            summary.total_volume += trade.value();
            summary
        })
    }
}

/// Everything the dashboard page shows in one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Last persisted bot status
    pub status: Option<BotStatusRecord>,
    pub performance: TradeSummary,
    pub recent_trades: Vec<TradeRecord>,
    pub active_orders: Vec<OrderRecord>,
    pub grid_levels: Vec<GridLevelRecord>,
    pub timestamp: DateTime<Utc>,
}
