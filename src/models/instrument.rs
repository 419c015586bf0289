//! Instrument pricing conventions

use serde::{Deserialize, Serialize};

const INDEX_SYMBOLS: &[&str] = &[
    "US100", "US30", "NAS100", "SPX500", "GER40", "UK100", "JPN225", "US500", "TECH100",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Index,
    Forex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub symbol: String,
    pub kind: InstrumentKind,
    /// Price change of one pip (forex) or one point (index)
    pub pip_value: f64,
    /// Price precision accepted by the broker
    pub decimals: u32,
}

impl InstrumentSpec {
    /// Look up the conventions for a symbol; unknown symbols are treated as forex
    pub fn lookup(symbol: &str) -> Self {
        let symbol = symbol.trim().to_uppercase();
        if INDEX_SYMBOLS.contains(&symbol.as_str()) {
            return Self {
                symbol,
                kind: InstrumentKind::Index,
                pip_value: 1.0,
                decimals: 1,
            };
        }

        let jpy = symbol.contains("JPY");
        Self {
            kind: InstrumentKind::Forex,
            pip_value: if jpy { 0.01 } else { 0.0001 },
            decimals: if jpy { 3 } else { 5 },
            symbol,
        }
    }

    pub fn is_index(&self) -> bool {
        self.kind == InstrumentKind::Index
    }

    pub fn is_jpy(&self) -> bool {
        self.kind == InstrumentKind::Forex && self.symbol.contains("JPY")
    }

    pub fn distance_unit(&self) -> &'static str {
        match self.kind {
            InstrumentKind::Index => "points",
            InstrumentKind::Forex => "pips",
        }
    }

    /// Smallest take-profit / stop-loss distance an alert may request
    pub fn min_distance(&self) -> f64 {
        match self.kind {
            InstrumentKind::Index => 10.0,
            InstrumentKind::Forex if self.is_jpy() => 10.0,
            InstrumentKind::Forex => 5.0,
        }
    }

    /// Minimum gap, in price terms, between a stop-loss and the market price
    pub fn stop_buffer(&self) -> f64 {
        match self.kind {
            InstrumentKind::Index if self.symbol == "US100" => 10.0,
            InstrumentKind::Index => 5.0,
            InstrumentKind::Forex => 2.0 * self.pip_value,
        }
    }

    pub fn min_volume(&self) -> f64 {
        match self.kind {
            InstrumentKind::Index => 0.1,
            InstrumentKind::Forex => 0.01,
        }
    }

    pub fn to_price_offset(&self, distance: f64) -> f64 {
        distance * self.pip_value
    }

    pub fn to_pips(&self, price_delta: f64) -> f64 {
        price_delta.abs() / self.pip_value
    }

    pub fn round_price(&self, price: f64) -> f64 {
        round_to(price, self.decimals)
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
