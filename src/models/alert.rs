//! Inbound trading alerts
//!
//! Alerts use the compact keys of the charting platform's webhook
//! templates. Numbers may arrive as JSON numbers or as strings.

use crate::error::AlertError;
use crate::models::order::{AlertTags, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_SYMBOL: &str = "EURUSD";
pub const DEFAULT_SIZE: f64 = 0.01;
pub const DEFAULT_MAX_EXPOSURE: f64 = 0.01;

/// Marks an alert as handled for one account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessedAlertKey {
    pub alert_id: String,
    pub account: String,
}

impl ProcessedAlertKey {
    pub fn new(alert_id: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            alert_id: alert_id.into(),
            account: account.into(),
        }
    }
}

impl fmt::Display for ProcessedAlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.alert_id, self.account)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub account: String,
    pub side: Side,
    pub symbol: String,
    /// Exchange prefix stripped from the symbol, e.g. `OANDA` in `OANDA:EURUSD`
    pub exchange: Option<String>,
    pub size: f64,
    /// Maximum total open volume allowed on the account
    pub max_exposure: f64,
    /// Take-profit distance in pips or points
    pub take_profit: f64,
    /// Stop-loss distance in pips or points
    pub stop_loss: Option<f64>,
    pub reference_price: Option<f64>,
    pub use_reference: bool,
    pub reality_flag: Option<String>,
    pub max_reference_age: Option<String>,
    pub timeframe: Option<String>,
    pub tags: AlertTags,
    pub received_at: DateTime<Utc>,
}

impl Alert {
    pub fn from_payload(
        payload: &Value,
        default_account: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Self, AlertError> {
        let map = payload
            .as_object()
            .ok_or_else(|| AlertError::Malformed("payload must be a JSON object".to_string()))?;

        let alert_id = text(map, "id").ok_or(AlertError::MissingAlertId)?;

        let action = text(map, "a").unwrap_or_default();
        let side = Side::from_code(&action).ok_or(AlertError::InvalidAction(action))?;

        let raw_symbol = text(map, "sy").unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
        let (exchange, symbol) = split_symbol(&raw_symbol);
        if symbol.is_empty() {
            return Err(AlertError::InvalidSymbol(raw_symbol));
        }

        Ok(Self {
            alert_id,
            account: text(map, "l").unwrap_or_else(|| default_account.to_string()),
            side,
            symbol,
            exchange,
            size: number(map, "z")?.unwrap_or(DEFAULT_SIZE),
            max_exposure: number(map, "m")?.unwrap_or(DEFAULT_MAX_EXPOSURE),
            take_profit: number(map, "t")?.unwrap_or(0.0),
            stop_loss: number(map, "s")?,
            reference_price: number(map, "o")?,
            use_reference: text(map, "u").as_deref() == Some("1"),
            reality_flag: text(map, "r"),
            max_reference_age: text(map, "h"),
            timeframe: text(map, "tf"),
            tags: AlertTags {
                ft: text(map, "ft"),
                ff: text(map, "ff"),
                fd: text(map, "fd"),
                lh: text(map, "lh"),
                fr: text(map, "fr"),
            },
            received_at,
        })
    }

    pub fn key(&self) -> ProcessedAlertKey {
        ProcessedAlertKey::new(&self.alert_id, &self.account)
    }
}

/// Split `EXCHANGE:SYMBOL` into its parts and normalise the symbol
pub fn split_symbol(raw: &str) -> (Option<String>, String) {
    match raw.rsplit_once(':') {
        Some((exchange, symbol)) => {
            let exchange = exchange.trim();
            let exchange = (!exchange.is_empty()).then(|| exchange.to_uppercase());
            (exchange, symbol.trim().to_uppercase())
        }
        None => (None, raw.trim().to_uppercase()),
    }
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number(map: &Map<String, Value>, key: &'static str) -> Result<Option<f64>, AlertError> {
    let invalid = |value: &Value| AlertError::InvalidNumber {
        field: key,
        value: value.to_string(),
    };

    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| invalid(value)),
        Some(value @ Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| invalid(value))
        }
        Some(other) => Err(invalid(other)),
    }
}
