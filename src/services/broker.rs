//! Brokerage interface used by the pipeline and reconciliation

use crate::error::BrokerError;
use crate::models::{Candle, CredentialSlot, Order, Side, Timeframe, TradingAccount};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Closed orders are fetched over this window unless the caller narrows it
pub const DEFAULT_HISTORY_DAYS: i64 = 180;
pub const DEFAULT_CANDLE_BARS: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Single page large enough for a full account sync
    pub fn all() -> Self {
        Self::new(1, 1000)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub page: Page,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            from: None,
            to: None,
        }
    }

    /// Resolve the window, defaulting to the last 180 days ending now
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let to = self.to.unwrap_or(now);
        let from = self
            .from
            .unwrap_or_else(|| to - Duration::days(DEFAULT_HISTORY_DAYS));
        (from, to)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandleQuery {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl CandleQuery {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            from: None,
            to: None,
        }
    }

    /// Resolve the window, defaulting to 200 bars ending now
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or_else(|| {
            to - Duration::seconds(self.timeframe.seconds() * DEFAULT_CANDLE_BARS)
        });
        (from, to)
    }
}

/// A market order ready to send: prices are absolute, not distances
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Make sure a valid token exists for the slot
    async fn authenticate(&self, slot: CredentialSlot) -> Result<(), BrokerError>;

    async fn account_status(&self, account: &TradingAccount) -> Result<Value, BrokerError>;

    async fn active_orders(
        &self,
        account: &TradingAccount,
        page: Page,
    ) -> Result<Vec<Order>, BrokerError>;

    async fn closed_orders(
        &self,
        account: &TradingAccount,
        query: HistoryQuery,
    ) -> Result<Vec<Order>, BrokerError>;

    async fn place_market_order(
        &self,
        account: &TradingAccount,
        order: &MarketOrder,
    ) -> Result<Order, BrokerError>;

    async fn candles(&self, query: CandleQuery) -> Result<Vec<Candle>, BrokerError>;

    async fn close_all(&self, account: &TradingAccount) -> Result<Value, BrokerError>;

    /// Deposits and withdrawals; always read with the primary credentials
    async fn deposit_history(&self, account: &TradingAccount) -> Result<Value, BrokerError>;
}
