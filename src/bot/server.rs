use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::grid::{
    ControlResponse, Dashboard, ErrorKind, GridError, GridResult, OrderState, PersistenceSink, Supervisor,
    TradeSummary,
};

type BotState = Arc<Supervisor>;

const DEFAULT_LIMIT: usize = 50;
const DASHBOARD_TRADES: usize = 10;
const DASHBOARD_ACTIVE_ORDERS: usize = 50;

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
struct OrdersQuery {
    limit: Option<usize>,
    /// `active`, `filled` or `cancelled`
    status: Option<OrderState>,
}

/// Routes of the control API
pub fn router(supervisor: BotState) -> Router {
    Router::new()
        .route("/api/configure", post(configure_handler))
        .route("/api/start", post(start_handler))
        .route("/api/stop", post(stop_handler))
        .route("/api/status", get(status_handler))
        .route("/api/grid", get(grid_handler))
        .route("/api/grid-levels", get(grid_levels_handler))
        .route("/api/orders", get(orders_handler))
        .route("/api/trades", get(trades_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .with_state(supervisor)
}

/// Bind and serve the control API until the listener fails
pub async fn start_server(supervisor: BotState, host: &str, port: u16) -> GridResult<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| GridError::validation("server.host", format!("invalid address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Control API running on http://{}", addr);

    axum::serve(listener, router(supervisor))
        .await
        .map_err(|e| GridError::Http(e.to_string()))
}

fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Lifecycle => StatusCode::CONFLICT,
        ErrorKind::Connection => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn control_response(result: GridResult<String>) -> Response {
    let response = ControlResponse::from_result(result);
    let code = response.kind.map(status_code).unwrap_or(StatusCode::OK);
    (code, Json(response)).into_response()
}

fn error_response(err: GridError) -> Response {
    warn!("Request failed: {}", err);
    control_response(Err(err))
}

async fn configure_handler(
    State(supervisor): State<BotState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let raw = match body {
        Ok(Json(Value::Object(raw))) => raw,
        Ok(_) => return error_response(GridError::validation("body", "expected a JSON object")),
        Err(rejection) => return error_response(GridError::validation("body", rejection.body_text())),
    };
    control_response(supervisor.configure(&raw).await)
}

async fn start_handler(State(supervisor): State<BotState>) -> Response {
    control_response(supervisor.start().await)
}

async fn stop_handler(State(supervisor): State<BotState>) -> Response {
    control_response(supervisor.stop().await)
}

async fn status_handler(State(supervisor): State<BotState>) -> Response {
    Json(supervisor.status().await).into_response()
}

async fn grid_handler(State(supervisor): State<BotState>) -> Response {
    Json(supervisor.engine_snapshot().await).into_response()
}

async fn grid_levels_handler(State(supervisor): State<BotState>) -> Response {
    match supervisor.sink().grid_levels().await {
        Ok(levels) => Json(json!({ "grid_levels": levels })).into_response(),
        Err(e) => error_response(e),
    }
}

async fn orders_handler(State(supervisor): State<BotState>, Query(query): Query<OrdersQuery>) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    match supervisor.sink().recent_orders(limit, query.status).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => error_response(e),
    }
}

async fn trades_handler(State(supervisor): State<BotState>, Query(query): Query<LimitQuery>) -> Response {
    match supervisor.sink().recent_trades(query.limit()).await {
        Ok(trades) => Json(trades).into_response(),
        Err(e) => error_response(e),
    }
}

async fn dashboard_handler(State(supervisor): State<BotState>) -> Response {
    match dashboard(supervisor.sink().as_ref()).await {
        Ok(dashboard) => Json(dashboard).into_response(),
        Err(e) => error_response(e),
    }
}

async fn dashboard(sink: &dyn PersistenceSink) -> GridResult<Dashboard> {
    let trades = sink.recent_trades(usize::MAX).await?;
    Ok(Dashboard {
        status: sink.latest_status().await?,
        performance: TradeSummary::from_trades(&trades),
        recent_trades: trades.into_iter().take(DASHBOARD_TRADES).collect(),
        active_orders: sink
            .recent_orders(DASHBOARD_ACTIVE_ORDERS, Some(OrderState::Active))
            .await?,
        grid_levels: sink.grid_levels().await?,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::executor::mock::{MockExchange, MockGatewayFactory};
    use crate::grid::{JsonStore, OrderSide};
    use std::time::Duration;

    async fn spawn_api(price: f64) -> (String, Arc<MockExchange>) {
        let exchange = Arc::new(MockExchange::new(price));
        let supervisor = Arc::new(Supervisor::new(
            Arc::new(MockGatewayFactory::new(exchange.clone())),
            Arc::new(JsonStore::in_memory()),
            None,
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(supervisor)).await.unwrap();
        });
        (format!("http://{}", addr), exchange)
    }

    fn grid_body() -> Value {
        json!({
            "api_key": "key",
            "api_secret": "secret",
            "symbol": "BTCUSDT",
            "grid_levels": 5,
            "grid_lower": 100,
            "grid_upper": 200,
            "order_amount": 0.1,
            "check_interval": 0.02,
            "placement_delay_ms": 0,
            "request_timeout_secs": 1
        })
    }

    #[tokio::test]
    async fn test_configure_start_stop_over_http() {
        let (base, exchange) = spawn_api(150.0).await;
        let client = reqwest::Client::new();

        let resp = client.post(format!("{}/api/configure", base)).json(&grid_body()).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "success");

        let resp = client.post(format!("{}/api/start", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);

        let status: Value = client.get(format!("{}/api/status", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(status["running"], true);
        assert!(status["config"].get("api_key").is_none());
        assert!(status["config"].get("api_secret").is_none());
        assert_eq!(status["engine"]["active_buys"], 2);

        let grid: Value = client.get(format!("{}/api/grid", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(grid["active_sells"], 2);

        let orders: Vec<Value> = client
            .get(format!("{}/api/orders?limit=3", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(orders.len(), 3);

        let levels: Value = client.get(format!("{}/api/grid-levels", base)).send().await.unwrap().json().await.unwrap();
        let levels = levels["grid_levels"].as_array().unwrap();
        assert_eq!(levels.len(), 5);
        assert_eq!(levels[0]["price"], 100.0);
        assert_eq!(levels[0]["has_buy"], true);
        assert_eq!(levels[4]["has_sell"], true);

        let resp = client.post(format!("{}/api/start", base)).send().await.unwrap();
        assert_eq!(resp.status(), 409);

        let resp = client.post(format!("{}/api/stop", base)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(exchange.open_snapshot().await.is_empty());

        let grid: Value = client.get(format!("{}/api/grid", base)).send().await.unwrap().json().await.unwrap();
        assert!(grid.is_null());
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let (base, exchange) = spawn_api(150.0).await;
        let client = reqwest::Client::new();

        let resp = client.post(format!("{}/api/stop", base)).send().await.unwrap();
        assert_eq!(resp.status(), 409);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "lifecycle");

        let mut bad = grid_body();
        bad["grid_levels"] = json!(1);
        let resp = client.post(format!("{}/api/configure", base)).json(&bad).send().await.unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{}/api/configure", base))
            .header("content-type", "application/json")
            .body("[1, 2]")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        client.post(format!("{}/api/configure", base)).json(&grid_body()).send().await.unwrap();
        exchange.set_price(None).await;
        let resp = client.post(format!("{}/api/start", base)).send().await.unwrap();
        assert_eq!(resp.status(), 502);
    }

    #[tokio::test]
    async fn test_orders_status_filter_and_dashboard() {
        let (base, exchange) = spawn_api(150.0).await;
        let client = reqwest::Client::new();
        client.post(format!("{}/api/configure", base)).json(&grid_body()).send().await.unwrap();
        client.post(format!("{}/api/start", base)).send().await.unwrap();

        // the loop replaces a buy fill with a sell one level up
        exchange.fill_at(OrderSide::Buy, 125.0).await.unwrap();
        let mut active: Vec<Value> = Vec::new();
        for _ in 0..50 {
            active = client
                .get(format!("{}/api/orders?status=active&limit=10", base))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if active.iter().any(|o| o["side"] == "Sell" && o["price"] == 150.0) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(active.len(), 4);
        assert!(active.iter().all(|o| o["state"] == "active"));

        let filled: Vec<Value> = client
            .get(format!("{}/api/orders?status=filled", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0]["price"], 125.0);
        assert_eq!(filled[0]["state"], "filled");

        let resp = client.get(format!("{}/api/orders?status=bogus", base)).send().await.unwrap();
        assert_eq!(resp.status(), 400);

        let dashboard: Value = client.get(format!("{}/api/dashboard", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(dashboard["status"]["is_running"], true);
        assert_eq!(dashboard["performance"]["total_trades"], 1);
        assert_eq!(dashboard["performance"]["buy_trades"], 1);
        assert_eq!(dashboard["performance"]["total_volume"], 12.5);
        assert_eq!(dashboard["recent_trades"].as_array().unwrap().len(), 1);
        assert_eq!(dashboard["active_orders"].as_array().unwrap().len(), 4);
        assert_eq!(dashboard["grid_levels"].as_array().unwrap().len(), 5);
        assert!(dashboard["timestamp"].is_string());

        client.post(format!("{}/api/stop", base)).send().await.unwrap();
    }

    #[tokio::test]
    async fn test_dashboard_before_configure() {
        let (base, _) = spawn_api(150.0).await;
        let dashboard: Value = reqwest::get(format!("{}/api/dashboard", base)).await.unwrap().json().await.unwrap();
        assert!(dashboard["status"].is_null());
        assert_eq!(dashboard["performance"]["total_trades"], 0);
        assert_eq!(dashboard["performance"]["total_volume"], 0.0);
        assert!(dashboard["active_orders"].as_array().unwrap().is_empty());

        let levels: Value = reqwest::get(format!("{}/api/grid-levels", base)).await.unwrap().json().await.unwrap();
        assert!(levels["grid_levels"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trades_default_empty() {
        let (base, _) = spawn_api(150.0).await;
        let trades: Vec<Value> = reqwest::get(format!("{}/api/trades", base)).await.unwrap().json().await.unwrap();
        assert!(trades.is_empty());
    }
}
