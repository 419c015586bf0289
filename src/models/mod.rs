//! Shared data models spanning the pipeline layers.

pub mod account;
pub mod alert;
pub mod candle;
pub mod instrument;
pub mod order;
pub mod outcome;
pub mod quote;

pub use account::{
    AccountSettings, CredentialSlot, Exposure, Reality, TradingAccount, TradingMode,
    TradingSession,
};
pub use alert::{Alert, ProcessedAlertKey};
pub use candle::{Candle, Timeframe};
pub use instrument::{InstrumentKind, InstrumentSpec};
pub use order::{AlertTags, Order, Side};
pub use outcome::{OutcomeStatus, WebhookOutcome};
pub use quote::Quote;
