use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, epoch seconds
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Chart timeframes and their broker codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    #[default]
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Parse a chart tag such as `15m` or `4h`; unknown tags fall back to one hour
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "1m" | "m1" => Timeframe::M1,
            "5m" | "m5" => Timeframe::M5,
            "15m" | "m15" => Timeframe::M15,
            "4h" | "h4" => Timeframe::H4,
            "1d" | "d1" => Timeframe::D1,
            _ => Timeframe::H1,
        }
    }

    pub fn broker_code(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
        }
    }
}
