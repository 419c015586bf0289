//! External services: brokerage API, quote stream and their interfaces

pub mod broker;
pub mod market_data;
pub mod simplefx;
pub mod websocket;

pub use broker::{Broker, CandleQuery, HistoryQuery, MarketOrder, Page};
pub use market_data::{QuoteSource, StaticQuotes};
