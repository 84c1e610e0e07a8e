//! Exchange abstraction for grid trading - enables mocking for tests

use std::sync::Arc;

use async_trait::async_trait;

use super::bybit::BybitGateway;
use super::config::{GridConfig, MarketCategory};
use super::errors::GridResult;
use super::types::{OpenOrder, OrderRef, OrderRequest};

/// Exchange operations the grid engine depends on
///
/// Every call is a network round-trip; callers bound them with a timeout.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Last traded price
    async fn ticker_price(&self, symbol: &str, category: MarketCategory) -> GridResult<f64>;

    /// Place an order, returning the exchange order id
    async fn place_order(&self, order: &OrderRequest) -> GridResult<String>;

    /// Cancel one order by exchange or client id
    async fn cancel_order(&self, symbol: &str, category: MarketCategory, order: &OrderRef) -> GridResult<()>;

    /// Cancel every open order for the symbol
    async fn cancel_all_orders(&self, symbol: &str, category: MarketCategory) -> GridResult<()>;

    /// Orders currently resting on the book for the symbol
    async fn open_orders(&self, symbol: &str, category: MarketCategory) -> GridResult<Vec<OpenOrder>>;
}

/// Builds a gateway for a configuration at start time
pub trait GatewayFactory: Send + Sync {
    fn connect(&self, config: &GridConfig) -> GridResult<Arc<dyn ExchangeGateway>>;
}

/// Creates [`BybitGateway`] clients from the configured credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct BybitGatewayFactory;

impl GatewayFactory for BybitGatewayFactory {
    fn connect(&self, config: &GridConfig) -> GridResult<Arc<dyn ExchangeGateway>> {
        let gateway: Arc<dyn ExchangeGateway> =
            Arc::new(BybitGateway::new(&config.credentials, config.request_timeout())?);
        Ok(gateway)
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Mock exchange for testing grid bots without a real exchange connection.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Mutex;

    use crate::grid::errors::GridError;
    use crate::grid::types::OrderSide;

    /// Mock exchange for testing
    ///
    /// Placed limit orders rest in an open-order book until a test fills or
    /// cancels them.
    pub struct MockExchange {
        /// Ticker price; `None` makes `ticker_price` fail
        pub price: Mutex<Option<f64>>,
        /// Every accepted order request, in placement order
        pub placed: Mutex<Vec<OrderRequest>>,
        /// Orders resting on the mock book
        pub open: Mutex<Vec<OpenOrder>>,
        pub cancelled: Mutex<Vec<OrderRef>>,
        pub rejected_prices: Mutex<Vec<f64>>,
        pub fail_place: Mutex<bool>,
        pub fail_open_orders: Mutex<bool>,
        pub fail_cancel_all: Mutex<bool>,
        /// Artificial latency of `open_orders`
        pub open_orders_delay: Mutex<Option<Duration>>,
        pub cancel_all_calls: AtomicUsize,
        pub open_orders_calls: AtomicUsize,
        next_oid: AtomicU64,
    }

    impl MockExchange {
        pub fn new(price: f64) -> Self {
            Self {
                price: Mutex::new(Some(price)),
                placed: Mutex::new(Vec::new()),
                open: Mutex::new(Vec::new()),
                cancelled: Mutex::new(Vec::new()),
                rejected_prices: Mutex::new(Vec::new()),
                fail_place: Mutex::new(false),
                fail_open_orders: Mutex::new(false),
                fail_cancel_all: Mutex::new(false),
                open_orders_delay: Mutex::new(None),
                cancel_all_calls: AtomicUsize::new(0),
                open_orders_calls: AtomicUsize::new(0),
                next_oid: AtomicU64::new(1),
            }
        }

        pub async fn set_price(&self, price: Option<f64>) {
            *self.price.lock().await = price;
        }

        pub async fn set_fail_place(&self, fail: bool) {
            *self.fail_place.lock().await = fail;
        }

        pub async fn set_fail_open_orders(&self, fail: bool) {
            *self.fail_open_orders.lock().await = fail;
        }

        pub async fn set_fail_cancel_all(&self, fail: bool) {
            *self.fail_cancel_all.lock().await = fail;
        }

        pub async fn set_open_orders_delay(&self, delay: Option<Duration>) {
            *self.open_orders_delay.lock().await = delay;
        }

        /// Reject any placement at this price
        pub async fn reject_price(&self, price: f64) {
            self.rejected_prices.lock().await.push(price);
        }

        /// Fill the resting order at `price` on `side`, returning its client id
        pub async fn fill_at(&self, side: OrderSide, price: f64) -> Option<String> {
            let mut open = self.open.lock().await;
            let idx = open.iter().position(|o| o.side == side && o.price == price)?;
            Some(open.remove(idx).client_id)
        }

        /// Resting orders on the mock book
        pub async fn open_snapshot(&self) -> Vec<OpenOrder> {
            self.open.lock().await.clone()
        }

        pub async fn placed_snapshot(&self) -> Vec<OrderRequest> {
            self.placed.lock().await.clone()
        }
    }

    #[async_trait]
    impl ExchangeGateway for MockExchange {
        async fn ticker_price(&self, symbol: &str, _category: MarketCategory) -> GridResult<f64> {
            self.price
                .lock()
                .await
                .ok_or_else(|| GridError::Exchange(format!("no ticker for {}", symbol)))
        }

        async fn place_order(&self, order: &OrderRequest) -> GridResult<String> {
            if *self.fail_place.lock().await {
                return Err(GridError::Exchange("Mock failure".into()));
            }
            let price = order.price.unwrap_or_default();
            if self.rejected_prices.lock().await.contains(&price) {
                return Err(GridError::Exchange(format!("Mock rejected price {}", price)));
            }

            let oid = self.next_oid.fetch_add(1, Ordering::SeqCst).to_string();
            self.placed.lock().await.push(order.clone());
            self.open.lock().await.push(OpenOrder {
                client_id: order.client_id.clone(),
                exchange_id: oid.clone(),
                side: order.side,
                price,
            });
            Ok(oid)
        }

        async fn cancel_order(&self, _symbol: &str, _category: MarketCategory, order: &OrderRef) -> GridResult<()> {
            self.open.lock().await.retain(|o| match order {
                OrderRef::Exchange(id) => &o.exchange_id != id,
                OrderRef::Client(id) => &o.client_id != id,
            });
            self.cancelled.lock().await.push(order.clone());
            Ok(())
        }

        async fn cancel_all_orders(&self, _symbol: &str, _category: MarketCategory) -> GridResult<()> {
            self.cancel_all_calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_cancel_all.lock().await {
                return Err(GridError::Exchange("Mock cancel-all failure".into()));
            }
            self.open.lock().await.clear();
            Ok(())
        }

        async fn open_orders(&self, _symbol: &str, _category: MarketCategory) -> GridResult<Vec<OpenOrder>> {
            self.open_orders_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.open_orders_delay.lock().await;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if *self.fail_open_orders.lock().await {
                return Err(GridError::Exchange("Mock open-orders failure".into()));
            }
            Ok(self.open.lock().await.clone())
        }
    }

    /// Hands out the same shared mock on every connect
    #[derive(Clone)]
    pub struct MockGatewayFactory {
        pub exchange: Arc<MockExchange>,
    }

    impl MockGatewayFactory {
        pub fn new(exchange: Arc<MockExchange>) -> Self {
            Self { exchange }
        }
    }

    impl GatewayFactory for MockGatewayFactory {
        fn connect(&self, _config: &GridConfig) -> GridResult<Arc<dyn ExchangeGateway>> {
            let exchange: Arc<dyn ExchangeGateway> = self.exchange.clone();
            Ok(exchange)
        }
    }
}
