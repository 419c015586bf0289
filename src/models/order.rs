//! Canonical order record shared by placement and reconciliation

use crate::models::account::Reality;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Single-letter action code used by alerts (`B` / `S`)
    pub fn code(&self) -> &'static str {
        match self {
            Side::Buy => "B",
            Side::Sell => "S",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "B" | "BUY" => Some(Side::Buy),
            "S" | "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Side::from_code(s).ok_or_else(|| format!("unknown side '{}'", s))
    }
}

/// Opaque analytics tags forwarded from the alert (`ft`, `ff`, `fd`, `lh`, `fr`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTags {
    pub ft: Option<String>,
    pub ff: Option<String>,
    pub fd: Option<String>,
    pub lh: Option<String>,
    pub fr: Option<String>,
}

/// An order as stored in the ledger.
///
/// `None` means "unknown" rather than "cleared": the ledger never
/// overwrites a stored value with `None`. Broker events may omit even the
/// symbol, side or volume of an order that is already recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub login: String,
    pub symbol: Option<String>,
    pub side: Option<Side>,
    pub volume: Option<f64>,
    pub reality: Reality,
    pub open_price: Option<f64>,
    pub close_price: Option<f64>,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    /// Epoch milliseconds
    pub open_time: Option<i64>,
    /// Epoch milliseconds
    pub close_time: Option<i64>,
    pub profit: Option<f64>,
    pub swap: Option<f64>,
    pub commission: Option<f64>,
    pub leverage: Option<f64>,
    pub margin: Option<f64>,
    pub margin_rate: Option<f64>,
    pub request_id: Option<String>,
    pub is_fifo: Option<bool>,
    pub reference_price: Option<f64>,
    pub consider_reference: Option<bool>,
    pub bid_at_open: Option<f64>,
    pub ask_at_open: Option<f64>,
    pub spread_at_open: Option<f64>,
    pub real_tp_pips: Option<f64>,
    pub real_sl_pips: Option<f64>,
    pub reference_deviation_pips: Option<f64>,
    pub duration_minutes: Option<i64>,
    pub max_size: Option<f64>,
    pub alert_id: Option<String>,
    pub max_reference_age: Option<String>,
    pub timeframe: Option<String>,
    pub exchange: Option<String>,
    #[serde(flatten)]
    pub tags: AlertTags,
}

impl Order {
    pub fn new(
        order_id: impl Into<String>,
        login: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        volume: f64,
        reality: Reality,
    ) -> Self {
        Self {
            symbol: Some(symbol.into()),
            side: Some(side),
            volume: Some(volume),
            ..Self::partial(order_id, login, reality)
        }
    }

    /// Record known only by id and account, to be merged into the ledger
    pub fn partial(order_id: impl Into<String>, login: impl Into<String>, reality: Reality) -> Self {
        Self {
            order_id: order_id.into(),
            login: login.into(),
            symbol: None,
            side: None,
            volume: None,
            reality,
            open_price: None,
            close_price: None,
            take_profit: None,
            stop_loss: None,
            open_time: None,
            close_time: None,
            profit: None,
            swap: None,
            commission: None,
            leverage: None,
            margin: None,
            margin_rate: None,
            request_id: None,
            is_fifo: None,
            reference_price: None,
            consider_reference: None,
            bid_at_open: None,
            ask_at_open: None,
            spread_at_open: None,
            real_tp_pips: None,
            real_sl_pips: None,
            reference_deviation_pips: None,
            duration_minutes: None,
            max_size: None,
            alert_id: None,
            max_reference_age: None,
            timeframe: None,
            exchange: None,
            tags: AlertTags::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.close_time.is_none()
    }
}
