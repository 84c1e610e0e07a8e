//! Grid trading configuration

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{GridError, GridResult};

/// Fields `configure` refuses to run without
pub const REQUIRED_FIELDS: [&str; 7] = [
    "api_key",
    "api_secret",
    "symbol",
    "grid_levels",
    "grid_lower",
    "grid_upper",
    "order_amount",
];

/// Most levels a grid may have; each level is a resting order
pub const MAX_GRID_LEVELS: u32 = 500;

/// Longest poll interval accepted, one day
pub const MAX_CHECK_INTERVAL_SECS: f64 = 86_400.0;

/// Market category for grid trading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketCategory {
    /// Spot trading
    #[default]
    Spot,
    /// USDT-margined perpetual futures
    Linear,
}

impl MarketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCategory::Spot => "spot",
            MarketCategory::Linear => "linear",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "spot" => Some(MarketCategory::Spot),
            "linear" => Some(MarketCategory::Linear),
            _ => None,
        }
    }
}

/// What to do when a fill has no adjacent level beyond the grid edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Place nothing; the edge level stays empty
    #[default]
    Leak,
    /// Re-place the filled side at the same edge level
    Rearm,
}

impl BoundaryPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "leak" => Some(BoundaryPolicy::Leak),
            "rearm" => Some(BoundaryPolicy::Rearm),
            _ => None,
        }
    }
}

/// Exchange API credentials
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_testnet")]
    pub testnet: bool,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .field("testnet", &self.testnet)
            .finish()
    }
}

fn default_testnet() -> bool {
    true
}

fn default_check_interval() -> f64 {
    10.0
}

fn default_price_decimals() -> u32 {
    2
}

fn default_placement_delay_ms() -> u64 {
    200
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Grid bot configuration
///
/// Field names match the keys accepted by [`GridConfig::from_raw`], so a
/// saved file can be fed back through the same validation on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Trading pair (e.g., "BTCUSDT")
    pub symbol: String,

    #[serde(rename = "market_type", default)]
    pub category: MarketCategory,

    /// Number of price points, bounds included
    pub grid_levels: u32,

    pub grid_lower: f64,

    pub grid_upper: f64,

    /// Base quantity of every grid order
    pub order_amount: f64,

    /// Seconds between reconciliation cycles
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,

    /// Decimal places grid prices are rounded to
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,

    #[serde(default)]
    pub boundary_policy: BoundaryPolicy,

    /// Pause between initial placements (exchange rate limits)
    #[serde(default = "default_placement_delay_ms")]
    pub placement_delay_ms: u64,

    /// Upper bound on every exchange call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(flatten)]
    pub credentials: Credentials,
}

impl GridConfig {
    /// Create a new grid configuration with required parameters
    pub fn new(
        symbol: impl Into<String>,
        category: MarketCategory,
        grid_levels: u32,
        grid_lower: f64,
        grid_upper: f64,
        order_amount: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            category,
            grid_levels,
            grid_lower,
            grid_upper,
            order_amount,
            check_interval: default_check_interval(),
            price_decimals: default_price_decimals(),
            boundary_policy: BoundaryPolicy::default(),
            placement_delay_ms: default_placement_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            credentials: Credentials {
                testnet: default_testnet(),
                ..Default::default()
            },
        }
    }

    /// Builder: set API credentials
    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>, testnet: bool) -> Self {
        self.credentials = Credentials {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            testnet,
        };
        self
    }

    /// Builder: set poll interval in seconds
    pub fn with_check_interval(mut self, secs: f64) -> Self {
        self.check_interval = secs;
        self
    }

    /// Builder: set price precision
    pub fn with_price_decimals(mut self, decimals: u32) -> Self {
        self.price_decimals = decimals;
        self
    }

    /// Builder: set boundary policy
    pub fn with_boundary_policy(mut self, policy: BoundaryPolicy) -> Self {
        self.boundary_policy = policy;
        self
    }

    /// Builder: set the delay between initial placements
    pub fn with_placement_delay_ms(mut self, ms: u64) -> Self {
        self.placement_delay_ms = ms;
        self
    }

    /// Builder: set the per-call exchange timeout
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Build and validate a configuration from an untyped JSON object
    ///
    /// Numeric fields may be JSON numbers or numeric strings. All required
    /// fields are checked before anything else so the error names every
    /// missing one.
    pub fn from_raw(raw: &Map<String, Value>) -> GridResult<Self> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| is_missing(raw.get(*field)))
            .collect();
        if !missing.is_empty() {
            return Err(GridError::validation(
                missing.join(", "),
                "required field is missing",
            ));
        }

        let category = match raw.get("market_type") {
            None | Some(Value::Null) => MarketCategory::default(),
            Some(value) => value
                .as_str()
                .and_then(MarketCategory::parse)
                .ok_or_else(|| GridError::validation("market_type", "must be 'spot' or 'linear'"))?,
        };

        let boundary_policy = match raw.get("boundary_policy") {
            None | Some(Value::Null) => BoundaryPolicy::default(),
            Some(value) => value
                .as_str()
                .and_then(BoundaryPolicy::parse)
                .ok_or_else(|| GridError::validation("boundary_policy", "must be 'leak' or 'rearm'"))?,
        };

        let config = Self {
            symbol: string_field(raw, "symbol")?,
            category,
            grid_levels: u32_field(raw, "grid_levels")?.unwrap_or_default(),
            grid_lower: f64_field(raw, "grid_lower")?.unwrap_or_default(),
            grid_upper: f64_field(raw, "grid_upper")?.unwrap_or_default(),
            order_amount: f64_field(raw, "order_amount")?.unwrap_or_default(),
            check_interval: f64_field(raw, "check_interval")?.unwrap_or_else(default_check_interval),
            price_decimals: u32_field(raw, "price_decimals")?.unwrap_or_else(default_price_decimals),
            boundary_policy,
            placement_delay_ms: u32_field(raw, "placement_delay_ms")?
                .map(u64::from)
                .unwrap_or_else(default_placement_delay_ms),
            request_timeout_secs: u32_field(raw, "request_timeout_secs")?
                .map(u64::from)
                .unwrap_or_else(default_request_timeout_secs),
            credentials: Credentials {
                api_key: string_field(raw, "api_key")?,
                api_secret: string_field(raw, "api_secret")?,
                testnet: bool_field(raw, "testnet")?.unwrap_or_else(default_testnet),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> GridResult<()> {
        if self.symbol.trim().is_empty() {
            return Err(GridError::validation("symbol", "cannot be empty"));
        }

        if !self.grid_lower.is_finite() || !self.grid_upper.is_finite() {
            return Err(GridError::validation("grid_lower", "grid bounds must be finite"));
        }

        if self.grid_lower >= self.grid_upper {
            return Err(GridError::validation(
                "grid_lower",
                "grid lower price must be less than upper price",
            ));
        }

        if self.grid_levels < 2 {
            return Err(GridError::validation("grid_levels", "grid levels must be at least 2"));
        }

        if self.grid_levels > MAX_GRID_LEVELS {
            return Err(GridError::validation(
                "grid_levels",
                format!("grid levels must be at most {}", MAX_GRID_LEVELS),
            ));
        }

        if !(self.order_amount > 0.0) || !self.order_amount.is_finite() {
            return Err(GridError::validation("order_amount", "order amount must be greater than 0"));
        }

        if !(self.check_interval > 0.0) || !self.check_interval.is_finite() {
            return Err(GridError::validation("check_interval", "must be a positive number of seconds"));
        }

        if self.check_interval > MAX_CHECK_INTERVAL_SECS {
            return Err(GridError::validation(
                "check_interval",
                format!("must be at most {} seconds", MAX_CHECK_INTERVAL_SECS),
            ));
        }

        if self.price_decimals > 12 {
            return Err(GridError::validation("price_decimals", "must be at most 12"));
        }

        // Adjacent levels must sit at least one price tick apart after rounding
        let ticks = (self.grid_upper - self.grid_lower) * 10f64.powi(self.price_decimals as i32);
        if f64::from(self.grid_levels - 1) > ticks {
            return Err(GridError::validation(
                "grid_levels",
                format!(
                    "{} levels do not fit between {} and {} at price_decimals {}",
                    self.grid_levels, self.grid_lower, self.grid_upper, self.price_decimals
                ),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(GridError::validation("request_timeout_secs", "must be at least 1"));
        }

        Ok(())
    }

    /// Poll interval as a duration
    pub fn check_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.check_interval.min(MAX_CHECK_INTERVAL_SECS))
            .unwrap_or(Duration::from_secs(MAX_CHECK_INTERVAL_SECS as u64))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn placement_delay(&self) -> Duration {
        Duration::from_millis(self.placement_delay_ms)
    }

    /// Round a price to the configured precision
    pub fn round_price(&self, price: f64) -> f64 {
        round_to_decimals(price, self.price_decimals)
    }

    /// Check if price is within grid range
    pub fn is_price_in_range(&self, price: f64) -> bool {
        price >= self.grid_lower && price <= self.grid_upper
    }

    /// Copy of this config with the range replaced
    pub fn with_range(&self, grid_lower: f64, grid_upper: f64) -> Self {
        Self {
            grid_lower,
            grid_upper,
            ..self.clone()
        }
    }

    /// Credential-free view for status reporting
    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            symbol: self.symbol.clone(),
            market_type: self.category,
            grid_levels: self.grid_levels,
            grid_lower: self.grid_lower,
            grid_upper: self.grid_upper,
            order_amount: self.order_amount,
            check_interval: self.check_interval,
            price_decimals: self.price_decimals,
            boundary_policy: self.boundary_policy,
            testnet: self.credentials.testnet,
        }
    }

    /// Load config from JSON file, re-running validation
    pub fn load_from_file(path: impl AsRef<Path>) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: Map<String, Value> = serde_json::from_str(&content)?;
        Self::from_raw(&raw)
    }

    /// Save config to JSON file, readable and writable by the owner only
    ///
    /// The file carries exchange credentials. It is written to a temp file
    /// created with mode 0600 and renamed over the target.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> GridResult<()> {
        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self)?;

        if temp_path.exists() {
            std::fs::remove_file(&temp_path)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

/// Configuration as reported by status queries; never carries credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactedConfig {
    pub symbol: String,
    pub market_type: MarketCategory,
    pub grid_levels: u32,
    pub grid_lower: f64,
    pub grid_upper: f64,
    pub order_amount: f64,
    pub check_interval: f64,
    pub price_decimals: u32,
    pub boundary_policy: BoundaryPolicy,
    pub testnet: bool,
}

/// Round to a fixed number of decimal places
///
/// Scales by an exact power of ten so values like `218.49999999999997`
/// land on `218.5` rather than drifting by one ulp.
pub fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn string_field(raw: &Map<String, Value>, field: &str) -> GridResult<String> {
    match raw.get(field) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(GridError::validation(field, "must be a string")),
        None => Ok(String::new()),
    }
}

fn f64_field(raw: &Map<String, Value>, field: &str) -> GridResult<Option<f64>> {
    let parsed = match raw.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(GridError::validation(field, "invalid numeric value")),
    }
}

fn u32_field(raw: &Map<String, Value>, field: &str) -> GridResult<Option<u32>> {
    let parsed = match raw.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        Some(_) => None,
    };

    parsed
        .map(Some)
        .ok_or_else(|| GridError::validation(field, "invalid integer value"))
}

fn bool_field(raw: &Map<String, Value>, field: &str) -> GridResult<Option<bool>> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(GridError::validation(field, "invalid boolean value")),
        },
        Some(Value::Number(n)) => Ok(Some(n.as_u64() == Some(1))),
        Some(_) => Err(GridError::validation(field, "invalid boolean value")),
    }
}
