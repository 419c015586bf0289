//! SimpleFX REST and quote-stream wire types

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub data: AuthData,
}

#[derive(Debug, Deserialize)]
pub struct AuthData {
    pub token: String,
}

/// Error body returned by the REST API
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub web_request_id: Option<String>,
}

impl ApiErrorBody {
    /// Best-effort human message from a raw error body
    pub fn describe(raw: &str) -> String {
        match serde_json::from_str::<ApiErrorBody>(raw) {
            Ok(body) => {
                let message = body.message.unwrap_or_else(|| raw.to_string());
                match body.web_request_id {
                    Some(id) => format!("{} (webRequestId {})", message, id),
                    None => message,
                }
            }
            Err(_) => raw.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveOrdersRequest<'a> {
    pub login: Value,
    pub reality: &'a str,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistoryRequest<'a> {
    pub login: Value,
    pub reality: &'a str,
    pub time_from: i64,
    pub time_to: i64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseAllRequest<'a> {
    pub login: Value,
    pub reality: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketOrderRequest<'a> {
    pub reality: &'a str,
    pub login: Value,
    pub symbol: &'a str,
    pub side: &'a str,
    pub volume: f64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    #[serde(rename = "IsFIFO")]
    pub is_fifo: bool,
    pub request_id: String,
    pub activity: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrdersData {
    #[serde(default)]
    pub market_orders: Vec<MarketOrderEntry>,
}

/// Placement responses wrap the order; list responses return it bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MarketOrderEntry {
    Wrapped { order: BrokerOrder },
    Plain(BrokerOrder),
}

impl MarketOrderEntry {
    pub fn into_order(self) -> BrokerOrder {
        match self {
            MarketOrderEntry::Wrapped { order } => order,
            MarketOrderEntry::Plain(order) => order,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerOrder {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub login: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub open_price: Option<f64>,
    #[serde(default)]
    pub close_price: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub open_time: Option<i64>,
    #[serde(default)]
    pub close_time: Option<i64>,
    #[serde(default)]
    pub profit: Option<f64>,
    #[serde(default)]
    pub swaps: Option<f64>,
    #[serde(default)]
    pub commission: Option<f64>,
    #[serde(default)]
    pub leverage: Option<f64>,
    #[serde(default)]
    pub margin: Option<f64>,
    #[serde(default)]
    pub margin_rate: Option<f64>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default, rename = "isFIFO")]
    pub is_fifo: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandlesData {
    #[serde(default)]
    pub candles: Vec<BrokerCandle>,
}

#[derive(Debug, Deserialize)]
pub struct BrokerCandle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Outbound quote-stream request
#[derive(Debug, Serialize)]
pub struct StreamRequest<'a> {
    pub p: &'a str,
    pub i: u64,
    pub d: Vec<String>,
}

pub const SUBSCRIBE_PATH: &str = "/subscribe/addList";
pub const LAST_PRICES_PATH: &str = "/lastprices/list";
pub const QUOTES_PATH: &str = "/quotes/subscribed";

/// Inbound quote-stream message
#[derive(Debug, Deserialize)]
pub struct StreamMessage {
    #[serde(default)]
    pub p: String,
    #[serde(default)]
    pub d: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuote {
    pub s: String,
    pub b: f64,
    pub a: f64,
    #[serde(default)]
    pub t: Option<i64>,
}

/// Broker ids are numbers on some endpoints and strings on others
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("invalid id: {}", other))),
    }
}

/// Logins are sent as integers when they look like one
pub fn login_value(login: &str) -> Value {
    login
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(login.to_string()))
}
