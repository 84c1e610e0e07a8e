//! Durable records of orders, trades, grid levels and bot status

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::errors::{GridError, GridResult};
use super::types::{BotStatusRecord, GridLevelRecord, OrderRecord, OrderState, TradeRecord};

/// Where the engine and supervisor write their history
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn record_status(&self, status: &BotStatusRecord) -> GridResult<()>;

    /// Insert an order, or replace the one with the same client id
    async fn record_order(&self, order: &OrderRecord) -> GridResult<()>;

    async fn update_order_status(
        &self,
        client_id: &str,
        state: OrderState,
        filled_at: Option<DateTime<Utc>>,
    ) -> GridResult<()>;

    async fn record_trade(&self, trade: &TradeRecord) -> GridResult<()>;

    /// Insert or replace the record for `level.price`
    async fn record_grid_level(&self, level: &GridLevelRecord) -> GridResult<()>;

    async fn latest_status(&self) -> GridResult<Option<BotStatusRecord>>;

    /// Newest first, optionally only those in `state`
    async fn recent_orders(&self, limit: usize, state: Option<OrderState>) -> GridResult<Vec<OrderRecord>>;

    /// Newest first
    async fn recent_trades(&self, limit: usize) -> GridResult<Vec<TradeRecord>>;

    async fn grid_levels(&self) -> GridResult<Vec<GridLevelRecord>>;
}

/// Orders and trades kept per store before the oldest are dropped
pub const DEFAULT_HISTORY_LIMIT: usize = 5_000;

/// Everything the store holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BotStatusRecord>,
    #[serde(default)]
    pub orders: Vec<OrderRecord>,
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
    #[serde(default)]
    pub grid_levels: Vec<GridLevelRecord>,
}

impl StoreData {
    /// Load store data from file
    pub fn load_from_file(path: impl AsRef<Path>) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let data: Self = serde_json::from_str(&content)?;
        Ok(data)
    }

    /// Save to file atomically (write to temp, then rename)
    pub fn save_to_file_atomic(&self, path: impl AsRef<Path>) -> GridResult<()> {
        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Drop the oldest finished orders and oldest trades beyond `limit`
    ///
    /// Active orders are never dropped, so the order list may stay above
    /// the limit while that many orders rest on the book.
    pub fn prune(&mut self, limit: usize) -> usize {
        let mut excess = self.orders.len().saturating_sub(limit);
        let before = self.orders.len();
        self.orders.retain(|o| {
            if excess > 0 && !o.is_active() {
                excess -= 1;
                false
            } else {
                true
            }
        });
        let dropped_orders = before - self.orders.len();

        let dropped_trades = self.trades.len().saturating_sub(limit);
        self.trades.drain(..dropped_trades);

        dropped_orders + dropped_trades
    }
}

/// JSON-backed [`PersistenceSink`]
///
/// Records live in memory; with a path, the whole document is rewritten
/// after every change. Order and trade history is capped at
/// `history_limit` entries each, which bounds the cost of every rewrite.
pub struct JsonStore {
    data: RwLock<StoreData>,
    path: Option<PathBuf>,
    history_limit: usize,
}

impl JsonStore {
    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            path: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Open the store at `path`, loading existing records if the file exists
    pub fn open(path: impl Into<PathBuf>) -> GridResult<Self> {
        let path = path.into();
        let data = if path.exists() {
            match StoreData::load_from_file(&path) {
                Ok(data) => {
                    info!(
                        "Loaded store from {:?}: {} orders, {} trades",
                        path,
                        data.orders.len(),
                        data.trades.len()
                    );
                    data
                }
                Err(e) => {
                    return Err(GridError::Persistence(format!(
                        "failed to load {:?}: {}",
                        path, e
                    )))
                }
            }
        } else {
            info!("No existing store at {:?}, starting empty", path);
            StoreData::default()
        };

        Ok(Self {
            data: RwLock::new(data),
            path: Some(path),
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Builder: cap order and trade history, trimming what is already loaded
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        let dropped = self.data.get_mut().prune(limit);
        if dropped > 0 {
            info!("Trimmed {} old records to keep history at {}", dropped, limit);
        }
        self.history_limit = limit;
        self
    }

    /// Apply a change and persist it
    async fn update<F, R>(&self, f: F) -> GridResult<R>
    where
        F: FnOnce(&mut StoreData) -> R,
    {
        let mut data = self.data.write().await;
        let result = f(&mut data);

        if let Some(path) = &self.path {
            data.save_to_file_atomic(path)?;
            debug!("Store saved to {:?}", path);
        }

        Ok(result)
    }
}

#[async_trait]
impl PersistenceSink for JsonStore {
    async fn record_status(&self, status: &BotStatusRecord) -> GridResult<()> {
        self.update(|data| data.status = Some(status.clone())).await
    }

    async fn record_order(&self, order: &OrderRecord) -> GridResult<()> {
        self.update(|data| {
            match data.orders.iter_mut().find(|o| o.client_id == order.client_id) {
                Some(existing) => *existing = order.clone(),
                None => {
                    data.orders.push(order.clone());
                    data.prune(self.history_limit);
                }
            }
        })
        .await
    }

    async fn update_order_status(
        &self,
        client_id: &str,
        state: OrderState,
        filled_at: Option<DateTime<Utc>>,
    ) -> GridResult<()> {
        let found = self
            .update(|data| match data.orders.iter_mut().find(|o| o.client_id == client_id) {
                Some(order) => {
                    order.state = state;
                    if filled_at.is_some() {
                        order.filled_at = filled_at;
                    }
                    true
                }
                None => false,
            })
            .await?;

        if found {
            Ok(())
        } else {
            warn!("Status update for unknown order {}", client_id);
            Err(GridError::Persistence(format!("unknown order {}", client_id)))
        }
    }

    async fn record_trade(&self, trade: &TradeRecord) -> GridResult<()> {
        self.update(|data| {
            data.trades.push(trade.clone());
            data.prune(self.history_limit);
        })
        .await
    }

    async fn record_grid_level(&self, level: &GridLevelRecord) -> GridResult<()> {
        self.update(|data| {
            match data.grid_levels.iter_mut().find(|l| l.price == level.price) {
                Some(existing) => *existing = level.clone(),
                None => {
                    data.grid_levels.push(level.clone());
                    data.grid_levels.sort_by(|a, b| a.price.total_cmp(&b.price));
                }
            }
        })
        .await
    }

    async fn latest_status(&self) -> GridResult<Option<BotStatusRecord>> {
        Ok(self.data.read().await.status.clone())
    }

    async fn recent_orders(&self, limit: usize, state: Option<OrderState>) -> GridResult<Vec<OrderRecord>> {
        let data = self.data.read().await;
        Ok(data
            .orders
            .iter()
            .rev()
            .filter(|o| state.map_or(true, |s| o.state == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_trades(&self, limit: usize) -> GridResult<Vec<TradeRecord>> {
        let data = self.data.read().await;
        Ok(data.trades.iter().rev().take(limit).cloned().collect())
    }

    async fn grid_levels(&self) -> GridResult<Vec<GridLevelRecord>> {
        Ok(self.data.read().await.grid_levels.clone())
    }
}
