//! Grid engine - order placement, fill detection and replacement

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::config::GridConfig;
use super::errors::{GridError, GridResult};
use super::executor::ExchangeGateway;
use super::persistence::PersistenceSink;
use super::strategy::{initial_side, GridLevels, Replacement};
use super::types::{
    EngineSnapshot, GridLevelRecord, OrderRecord, OrderRef, OrderRequest, OrderSide, OrderState,
    TradeRecord,
};

/// Outcome of seeding the grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitSummary {
    pub buys: usize,
    pub sells: usize,
    pub failed: usize,
}

impl InitSummary {
    pub fn placed(&self) -> usize {
        self.buys + self.sells
    }
}

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Correlation ids that moved from active to filled
    pub filled: Vec<String>,
    /// Correlation ids of replacement orders placed
    pub placed: Vec<String>,
}

/// Grid state for one trading pair over one run
///
/// The engine owns the order records it placed and keeps them in step with
/// the exchange by polling: an active order that no longer shows up among
/// the open orders is taken as filled. A fill is therefore only noticed on
/// the next [`GridEngine::reconcile`] call.
pub struct GridEngine {
    config: GridConfig,
    levels: GridLevels,
    gateway: Arc<dyn ExchangeGateway>,
    sink: Arc<dyn PersistenceSink>,
    orders: Vec<OrderRecord>,
    run_token: String,
    seq: u64,
    shut_down: bool,
}

impl GridEngine {
    /// Build an engine, computing its levels up front
    pub fn new(
        config: GridConfig,
        gateway: Arc<dyn ExchangeGateway>,
        sink: Arc<dyn PersistenceSink>,
    ) -> GridResult<Self> {
        let levels = GridLevels::compute(&config)?;
        let run_token: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();

        debug!(
            "Grid engine {} for {}: levels {:?}",
            run_token,
            config.symbol,
            levels.prices()
        );

        Ok(Self {
            config,
            levels,
            gateway,
            sink,
            orders: Vec::new(),
            run_token,
            seq: 0,
            shut_down: false,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn levels(&self) -> &GridLevels {
        &self.levels
    }

    /// Every order tracked this run, filled ones included
    pub fn orders(&self) -> &[OrderRecord] {
        &self.orders
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Seed the grid around `current_price`
    ///
    /// Levels below the price get a buy, levels above get a sell, a level
    /// equal to it gets nothing. Placement failures are logged and counted.
    pub async fn initialize(&mut self, current_price: f64) -> GridResult<InitSummary> {
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(GridError::Initialization(format!(
                "unusable current price {}",
                current_price
            )));
        }
        if self.shut_down {
            return Err(GridError::Initialization("engine has been shut down".into()));
        }

        if let Err(e) = self.cancel_all().await {
            warn!("Failed to cancel existing orders for {}: {}", self.config.symbol, e);
        }

        info!(
            "Initializing {} grid levels for {} at price {}",
            self.levels.len(),
            self.config.symbol,
            current_price
        );

        let mut summary = InitSummary::default();
        let delay = self.config.placement_delay();
        let prices = self.levels.prices().to_vec();

        for price in prices {
            let Some(side) = initial_side(price, current_price) else {
                debug!("Level {} is at the current price, leaving it empty", price);
                continue;
            };

            if summary.placed() + summary.failed > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.place(side, price).await {
                Ok(_) => match side {
                    OrderSide::Buy => summary.buys += 1,
                    OrderSide::Sell => summary.sells += 1,
                },
                Err(e) => {
                    error!("Failed to place {} at {}: {}", side.as_str(), price, e);
                    summary.failed += 1;
                }
            }
            self.persist_level(price).await;
        }

        info!(
            "Grid initialized: {} buys, {} sells, {} failed",
            summary.buys, summary.sells, summary.failed
        );
        Ok(summary)
    }

    /// Run one poll cycle: detect fills and place their replacements
    ///
    /// After [`GridEngine::shutdown`] this does nothing.
    pub async fn reconcile(&mut self) -> GridResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        if self.shut_down {
            return Ok(report);
        }

        let open = with_timeout(
            self.config.request_timeout(),
            self.config.request_timeout_secs,
            self.gateway.open_orders(&self.config.symbol, self.config.category),
        )
        .await
        .map_err(|e| GridError::Cycle(format!("fetching open orders: {}", e)))?;

        let open_ids: HashSet<&str> = open.iter().map(|o| o.client_id.as_str()).collect();
        let now = Utc::now();

        let mut filled: Vec<OrderRecord> = Vec::new();
        for order in self.orders.iter_mut().filter(|o| o.is_active()) {
            if !open_ids.contains(order.client_id.as_str()) {
                order.mark_filled(now);
                filled.push(order.clone());
            }
        }
        if filled.is_empty() {
            return Ok(report);
        }
        filled.sort_by(|a, b| a.price.total_cmp(&b.price));

        for order in &filled {
            info!(
                "Order filled: {} {} @ {} ({})",
                order.side.as_str(),
                order.qty,
                order.price,
                order.client_id
            );
            report.filled.push(order.client_id.clone());

            if let Err(e) = self
                .sink
                .update_order_status(&order.client_id, OrderState::Filled, Some(now))
                .await
            {
                warn!("Failed to persist fill of {}: {}", order.client_id, e);
            }
            if let Err(e) = self.sink.record_trade(&TradeRecord::from_order(order, now)).await {
                warn!("Failed to persist trade {}: {}", order.client_id, e);
            }
        }

        for order in &filled {
            match self
                .levels
                .replacement(order.side, order.price, self.config.boundary_policy)
            {
                Replacement::OffGrid => {
                    warn!(
                        "{} filled at grid edge {}, no replacement placed",
                        order.side.as_str(),
                        order.price
                    );
                }
                Replacement::Place { price, side, .. } => {
                    if self.has_active(side, price) {
                        warn!(
                            "Skipping replacement {} at {}: level already has an active {}",
                            side.as_str(),
                            price,
                            side.as_str()
                        );
                    } else {
                        match self.place(side, price).await {
                            Ok(client_id) => report.placed.push(client_id),
                            Err(e) => error!(
                                "Failed to place replacement {} at {}: {}",
                                side.as_str(),
                                price,
                                e
                            ),
                        }
                    }
                    self.persist_level(price).await;
                }
            }
            self.persist_level(order.price).await;
        }

        Ok(report)
    }

    /// Aggregate counts over the tracked orders
    pub fn status(&self) -> EngineSnapshot {
        let active_buys = self
            .orders
            .iter()
            .filter(|o| o.is_active() && o.side == OrderSide::Buy)
            .count();
        let active_sells = self
            .orders
            .iter()
            .filter(|o| o.is_active() && o.side == OrderSide::Sell)
            .count();
        let filled_orders = self
            .orders
            .iter()
            .filter(|o| o.state == OrderState::Filled)
            .count();

        EngineSnapshot {
            total_orders: self.orders.len(),
            active_buys,
            active_sells,
            filled_orders,
            grid_lower: self.config.grid_lower,
            grid_upper: self.config.grid_upper,
            grid_levels: self.config.grid_levels,
        }
    }

    /// Cancel every order for the symbol and forget local state
    ///
    /// Falls back to cancelling orders one by one when the bulk cancel
    /// fails. Calling it again is a no-op.
    pub async fn shutdown(&mut self) -> GridResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let active: Vec<OrderRecord> = self.orders.iter().filter(|o| o.is_active()).cloned().collect();
        info!(
            "Shutting down grid for {}: cancelling {} active orders",
            self.config.symbol,
            active.len()
        );

        if let Err(e) = self.cancel_all().await {
            warn!("Bulk cancel failed ({}), cancelling orders individually", e);
            for order in &active {
                let order_ref = OrderRef::Client(order.client_id.clone());
                let result = with_timeout(
                    self.config.request_timeout(),
                    self.config.request_timeout_secs,
                    self.gateway
                        .cancel_order(&self.config.symbol, self.config.category, &order_ref),
                )
                .await;
                if let Err(e) = result {
                    error!("Failed to cancel {}: {}", order.client_id, e);
                }
            }
        }

        for order in &active {
            if let Err(e) = self
                .sink
                .update_order_status(&order.client_id, OrderState::Cancelled, None)
                .await
            {
                warn!("Failed to persist cancellation of {}: {}", order.client_id, e);
            }
        }

        self.orders.clear();

        let mut prices: Vec<f64> = active.iter().map(|o| o.price).collect();
        prices.sort_by(|a, b| a.total_cmp(b));
        prices.dedup();
        for price in prices {
            self.persist_level(price).await;
        }

        Ok(())
    }

    async fn cancel_all(&self) -> GridResult<()> {
        with_timeout(
            self.config.request_timeout(),
            self.config.request_timeout_secs,
            self.gateway
                .cancel_all_orders(&self.config.symbol, self.config.category),
        )
        .await
    }

    fn has_active(&self, side: OrderSide, price: f64) -> bool {
        self.orders
            .iter()
            .any(|o| o.is_active() && o.side == side && o.price == price)
    }

    fn next_client_id(&mut self, side: OrderSide, price: f64) -> String {
        self.seq += 1;
        format!("g-{}-{}-{}-{}", side.short(), price, self.run_token, self.seq)
    }

    /// Place a limit order and track it as active
    async fn place(&mut self, side: OrderSide, price: f64) -> GridResult<String> {
        let client_id = self.next_client_id(side, price);
        let request = OrderRequest::limit(
            self.config.symbol.clone(),
            self.config.category,
            side,
            self.config.order_amount,
            price,
            client_id.clone(),
        );

        let exchange_id = with_timeout(
            self.config.request_timeout(),
            self.config.request_timeout_secs,
            self.gateway.place_order(&request),
        )
        .await?;

        let record = OrderRecord {
            client_id: client_id.clone(),
            exchange_id: Some(exchange_id),
            symbol: self.config.symbol.clone(),
            category: self.config.category,
            side,
            price,
            qty: self.config.order_amount,
            state: OrderState::Active,
            created_at: Utc::now(),
            filled_at: None,
        };

        info!(
            "Placed {} {} @ {} ({})",
            side.as_str(),
            record.qty,
            price,
            client_id
        );

        if let Err(e) = self.sink.record_order(&record).await {
            warn!("Failed to persist order {}: {}", client_id, e);
        }
        self.orders.push(record);

        Ok(client_id)
    }

    /// Write the current coverage of one level
    async fn persist_level(&self, price: f64) {
        let active_id = |side: OrderSide| {
            self.orders
                .iter()
                .find(|o| o.is_active() && o.side == side && o.price == price)
                .map(|o| o.client_id.clone())
        };
        let buy_client_id = active_id(OrderSide::Buy);
        let sell_client_id = active_id(OrderSide::Sell);

        let record = GridLevelRecord {
            price,
            has_buy: buy_client_id.is_some(),
            has_sell: sell_client_id.is_some(),
            buy_client_id,
            sell_client_id,
            updated_at: Utc::now(),
        };

        if let Err(e) = self.sink.record_grid_level(&record).await {
            warn!("Failed to persist grid level {}: {}", price, e);
        }
    }
}

/// Bound a gateway call, turning an elapsed deadline into [`GridError::Timeout`]
async fn with_timeout<T, F>(limit: Duration, secs: u64, fut: F) -> GridResult<T>
where
    F: Future<Output = GridResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(GridError::Timeout(secs)),
    }
}
