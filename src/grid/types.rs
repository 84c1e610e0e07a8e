//! Core data types for grid trading

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::MarketCategory;
use super::errors::GridError;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Convert to exchange side string
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }

    /// One-letter tag used inside correlation ids
    pub fn short(&self) -> &'static str {
        match self {
            OrderSide::Buy => "b",
            OrderSide::Sell => "s",
        }
    }
}

impl TryFrom<&str> for OrderSide {
    type Error = GridError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_uppercase().as_str() {
            "B" | "BUY" => Ok(OrderSide::Buy),
            "S" | "SELL" => Ok(OrderSide::Sell),
            _ => Err(GridError::Exchange(format!("unknown order side {:?}", s))),
        }
    }
}

/// Exchange order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "Limit",
        }
    }
}

/// Lifecycle of an order tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    /// Resting on the book (as far as the last poll knows)
    Active,
    /// Disappeared from the open-order set
    Filled,
    /// Cancelled by shutdown
    Cancelled,
}

/// An order placed by the grid engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Client correlation id (Bybit `orderLinkId`)
    pub client_id: String,
    /// Exchange-assigned id, once acknowledged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_id: Option<String>,
    pub symbol: String,
    pub category: MarketCategory,
    pub side: OrderSide,
    pub price: f64,
    pub qty: f64,
    pub state: OrderState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    pub fn is_active(&self) -> bool {
        self.state == OrderState::Active
    }

    /// Mark as filled at the given time
    pub fn mark_filled(&mut self, at: DateTime<Utc>) {
        self.state = OrderState::Filled;
        self.filled_at = Some(at);
    }
}

/// Request to place an order through the gateway
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub category: MarketCategory,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: f64,
    /// Limit price
    pub price: Option<f64>,
    pub client_id: String,
}

impl OrderRequest {
    /// Create a limit order request
    pub fn limit(
        symbol: impl Into<String>,
        category: MarketCategory,
        side: OrderSide,
        qty: f64,
        price: f64,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            category,
            side,
            order_type: OrderType::Limit,
            qty,
            price: Some(price),
            client_id: client_id.into(),
        }
    }
}

/// Identifies an order for cancellation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    Exchange(String),
    Client(String),
}

/// An order the exchange reports as open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub client_id: String,
    pub exchange_id: String,
    pub side: OrderSide,
    pub price: f64,
}

/// A filled grid order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_id: Option<String>,
    pub symbol: String,
    pub category: MarketCategory,
    pub side: OrderSide,
    pub price: f64,
    pub qty: f64,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn from_order(order: &OrderRecord, executed_at: DateTime<Utc>) -> Self {
        Self {
            client_id: order.client_id.clone(),
            exchange_id: order.exchange_id.clone(),
            symbol: order.symbol.clone(),
            category: order.category,
            side: order.side,
            price: order.price,
            qty: order.qty,
            executed_at,
        }
    }

    /// Notional value of this trade
    pub fn value(&self) -> f64 {
        self.price * self.qty
    }
}

/// Order coverage at one grid price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevelRecord {
    pub price: f64,
    pub has_buy: bool,
    pub has_sell: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_client_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted bot status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStatusRecord {
    pub is_running: bool,
    pub symbol: String,
    pub category: MarketCategory,
    pub grid_levels: u32,
    pub grid_lower: f64,
    pub grid_upper: f64,
    pub order_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregated view of an engine's order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub total_orders: usize,
    pub active_buys: usize,
    pub active_sells: usize,
    pub filled_orders: usize,
    pub grid_lower: f64,
    pub grid_upper: f64,
    pub grid_levels: u32,
}
