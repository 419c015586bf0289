//! Broker account identity, per-account settings and exposure

use crate::models::order::{Order, Side};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Broker account mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Reality {
    Live,
    Demo,
}

impl Reality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reality::Live => "LIVE",
            Reality::Demo => "DEMO",
        }
    }
}

impl fmt::Display for Reality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LIVE" => Ok(Reality::Live),
            "DEMO" => Ok(Reality::Demo),
            other => Err(format!("unknown reality '{}'", other)),
        }
    }
}

/// Which configured API key pair an account is traded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSlot {
    Primary,
    Secondary,
}

/// An account number resolved against configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradingAccount {
    pub login: String,
    pub reality: Reality,
    pub slot: CredentialSlot,
}

impl TradingAccount {
    pub fn new(login: impl Into<String>, reality: Reality, slot: CredentialSlot) -> Self {
        Self {
            login: login.into(),
            reality,
            slot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingMode {
    #[default]
    Normal,
    BuyOnly,
    SellOnly,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Normal => "NORMAL",
            TradingMode::BuyOnly => "BUY_ONLY",
            TradingMode::SellOnly => "SELL_ONLY",
        }
    }

    pub fn allows(&self, side: Side) -> bool {
        match self {
            TradingMode::Normal => true,
            TradingMode::BuyOnly => side == Side::Buy,
            TradingMode::SellOnly => side == Side::Sell,
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NORMAL" => Ok(TradingMode::Normal),
            "BUY_ONLY" => Ok(TradingMode::BuyOnly),
            "SELL_ONLY" => Ok(TradingMode::SellOnly),
            other => Err(format!("unknown trading mode '{}'", other)),
        }
    }
}

/// UTC trading session windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingSession {
    /// 00:00 to 08:00 UTC
    Asia,
    /// 08:00 to 16:00 UTC
    London,
    /// 16:00 to 24:00 UTC
    NewYork,
}

impl TradingSession {
    pub fn at(time: DateTime<Utc>) -> Self {
        match time.hour() {
            0..=7 => TradingSession::Asia,
            8..=15 => TradingSession::London,
            _ => TradingSession::NewYork,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TradingSession::Asia => "asia",
            TradingSession::London => "london",
            TradingSession::NewYork => "new york",
        }
    }
}

impl fmt::Display for TradingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-account trading restrictions, written by an external administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    pub trading_mode: TradingMode,
    pub asia_session: bool,
    pub london_session: bool,
    pub new_york_session: bool,
    /// Stored and reported; the three fixed windows never select it
    pub overlap_session: bool,
    pub exclusive_mode: bool,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            trading_mode: TradingMode::Normal,
            asia_session: true,
            london_session: true,
            new_york_session: true,
            overlap_session: true,
            exclusive_mode: false,
        }
    }
}

impl AccountSettings {
    pub fn session_enabled(&self, session: TradingSession) -> bool {
        match session {
            TradingSession::Asia => self.asia_session,
            TradingSession::London => self.london_session,
            TradingSession::NewYork => self.new_york_session,
        }
    }
}

/// Open positions the broker reports for an account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exposure {
    pub open_volume: f64,
    pub buy_count: usize,
    pub sell_count: usize,
    /// Open orders the broker reported without a side
    pub unknown_side_count: usize,
}

impl Exposure {
    pub fn from_orders(orders: &[Order]) -> Self {
        orders.iter().fold(Self::default(), |mut acc, order| {
            acc.open_volume += order.volume.unwrap_or_default();
            match order.side {
                Some(Side::Buy) => acc.buy_count += 1,
                Some(Side::Sell) => acc.sell_count += 1,
                None => acc.unknown_side_count += 1,
            }
            acc
        })
    }

    pub fn open_count(&self) -> usize {
        self.buy_count + self.sell_count + self.unknown_side_count
    }

    pub fn count(&self, side: Side) -> usize {
        match side {
            Side::Buy => self.buy_count,
            Side::Sell => self.sell_count,
        }
    }
}
