use crate::models::order::Side;
use serde::{Deserialize, Serialize};

/// Latest bid/ask snapshot for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    /// Broker timestamp, epoch milliseconds
    pub timestamp: i64,
}

impl Quote {
    pub fn new(symbol: impl Into<String>, bid: f64, ask: f64, timestamp: i64) -> Self {
        Self {
            symbol: symbol.into(),
            bid,
            ask,
            timestamp,
        }
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Price a market order on `side` would fill at
    pub fn entry_price(&self, side: Side) -> f64 {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }
}
