//! Wingbot: trading alert ingestion, order execution and ledger reconciliation
//!
//! Alerts arrive through [`core::TradingService`], are queued by
//! [`jobs::WebhookQueue`], checked by [`validation::RiskGate`], placed with
//! the broker through [`services::simplefx::SimpleFxClient`] and recorded in
//! [`db::OrderLedger`]. [`core::Reconciler`] keeps the ledger in line with
//! the broker's view of every monitored account.

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod validation;
