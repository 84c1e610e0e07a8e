//! Bybit v5 REST gateway

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;

use super::config::{Credentials, MarketCategory};
use super::errors::{GridError, GridResult};
use super::executor::ExchangeGateway;
use super::types::{OpenOrder, OrderRef, OrderRequest, OrderSide};

type HmacSha256 = Hmac<Sha256>;

pub const MAINNET_API_URL: &str = "https://api.bybit.com";
pub const TESTNET_API_URL: &str = "https://api-testnet.bybit.com";

const RECV_WINDOW: &str = "5000";
const OPEN_ORDERS_PAGE_LIMIT: &str = "50";
/// Invalid key, bad signature, permission denied, expired key
const AUTH_RET_CODES: [i64; 4] = [10003, 10004, 10005, 33004];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOpenOrder {
    order_id: String,
    #[serde(default)]
    order_link_id: String,
    side: String,
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenOrdersPage {
    #[serde(default)]
    list: Vec<RawOpenOrder>,
    #[serde(default)]
    next_page_cursor: String,
}

/// Signed REST client for the Bybit unified trading API
pub struct BybitGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl BybitGateway {
    pub fn new(credentials: &Credentials, timeout: Duration) -> GridResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = if credentials.testnet {
            TESTNET_API_URL
        } else {
            MAINNET_API_URL
        };

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
        })
    }

    /// Point the client at another host (e.g. a local stub)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `hex(HMAC_SHA256(secret, timestamp + api_key + recv_window + payload))`
    fn sign(&self, timestamp: &str, payload: &str) -> GridResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| GridError::Connection(format!("invalid API secret: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(self.api_key.as_bytes());
        mac.update(RECV_WINDOW.as_bytes());
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_headers(&self, payload: &str) -> GridResult<reqwest::header::HeaderMap> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp, payload)?;

        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in [
            ("x-bapi-api-key", self.api_key.as_str()),
            ("x-bapi-timestamp", timestamp.as_str()),
            ("x-bapi-recv-window", RECV_WINDOW),
            ("x-bapi-sign", signature.as_str()),
        ] {
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| GridError::Connection(format!("invalid header {}: {}", name, e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn get(&self, path: &str, params: &[(&str, &str)], signed: bool) -> GridResult<Value> {
        let query = build_query(params);
        let url = format!("{}{}?{}", self.base_url, path, query);
        let mut request = self.client.get(&url);
        if signed {
            request = request.headers(self.signed_headers(&query)?);
        }

        debug!("GET {}", path);
        let response = request.send().await?;
        let text = response.text().await?;
        parse_response(&text)
    }

    async fn post(&self, path: &str, body: &Value) -> GridResult<Value> {
        let body = serde_json::to_string(body)?;
        let url = format!("{}{}", self.base_url, path);

        debug!("POST {}", path);
        let response = self
            .client
            .post(&url)
            .headers(self.signed_headers(&body)?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let text = response.text().await?;
        parse_response(&text)
    }
}

#[async_trait]
impl ExchangeGateway for BybitGateway {
    async fn ticker_price(&self, symbol: &str, category: MarketCategory) -> GridResult<f64> {
        let result = self
            .get(
                "/v5/market/tickers",
                &[("category", category.as_str()), ("symbol", symbol)],
                false,
            )
            .await?;

        result["list"][0]["lastPrice"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| GridError::Exchange(format!("no last price for {}", symbol)))
    }

    async fn place_order(&self, order: &OrderRequest) -> GridResult<String> {
        let mut body = json!({
            "category": order.category.as_str(),
            "symbol": order.symbol,
            "side": order.side.as_str(),
            "orderType": order.order_type.as_str(),
            "qty": order.qty.to_string(),
            "timeInForce": "GTC",
            "orderLinkId": order.client_id,
        });
        if let Some(price) = order.price {
            body["price"] = Value::String(price.to_string());
        }

        let result = self.post("/v5/order/create", &body).await?;
        result["orderId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GridError::Exchange("order response carried no orderId".into()))
    }

    async fn cancel_order(&self, symbol: &str, category: MarketCategory, order: &OrderRef) -> GridResult<()> {
        let mut body = json!({
            "category": category.as_str(),
            "symbol": symbol,
        });
        match order {
            OrderRef::Exchange(id) => body["orderId"] = Value::String(id.clone()),
            OrderRef::Client(id) => body["orderLinkId"] = Value::String(id.clone()),
        }

        self.post("/v5/order/cancel", &body).await?;
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str, category: MarketCategory) -> GridResult<()> {
        let body = json!({
            "category": category.as_str(),
            "symbol": symbol,
        });
        self.post("/v5/order/cancel-all", &body).await?;
        Ok(())
    }

    async fn open_orders(&self, symbol: &str, category: MarketCategory) -> GridResult<Vec<OpenOrder>> {
        let mut orders = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut params = vec![
                ("category", category.as_str()),
                ("symbol", symbol),
                ("limit", OPEN_ORDERS_PAGE_LIMIT),
            ];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.as_str()));
            }

            let result = self.get("/v5/order/realtime", &params, true).await?;
            let page: OpenOrdersPage = serde_json::from_value(result)?;
            let page_len = page.list.len();
            for raw in page.list {
                orders.push(convert_open_order(raw)?);
            }

            if page.next_page_cursor.is_empty() || page_len == 0 {
                break;
            }
            cursor = page.next_page_cursor;
        }

        Ok(orders)
    }
}

fn build_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Unwrap the `result` of a v5 envelope, mapping `retCode` to errors
fn parse_response(text: &str) -> GridResult<Value> {
    let response: ApiResponse = serde_json::from_str(text)?;
    if response.ret_code == 0 {
        return Ok(response.result);
    }

    let message = format!("retCode {}: {}", response.ret_code, response.ret_msg);
    if AUTH_RET_CODES.contains(&response.ret_code) {
        Err(GridError::Connection(message))
    } else {
        Err(GridError::Exchange(message))
    }
}

/// A malformed entry fails the whole fetch; dropping it would read as a fill
fn convert_open_order(raw: RawOpenOrder) -> GridResult<OpenOrder> {
    let side = OrderSide::try_from(raw.side.as_str()).map_err(|e| {
        warn!("Open order {} has unknown side '{}'", raw.order_id, raw.side);
        e
    })?;
    let price = raw.price.parse::<f64>().map_err(|e| {
        warn!("Open order {} has unparseable price '{}'", raw.order_id, raw.price);
        GridError::Exchange(format!("open order {} price '{}': {}", raw.order_id, raw.price, e))
    })?;

    Ok(OpenOrder {
        client_id: raw.order_link_id,
        exchange_id: raw.order_id,
        side,
        price,
    })
}
