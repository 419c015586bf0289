//! Persistence layer

pub mod ledger;

pub use ledger::OrderLedger;
