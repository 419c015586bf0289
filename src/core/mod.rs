//! Core application wiring: service facade, HTTP adapter, reconciliation

pub mod http;
pub mod reconcile;
pub mod runtime;
pub mod scheduler;
pub mod service;

pub use http::{create_router, start_server, AppState};
pub use reconcile::{AccountSync, ReconcileConfig, Reconciler, SweepReport, SyncError};
pub use runtime::{Runtime, RuntimeConfig, RuntimeError};
pub use scheduler::ReconciliationScheduler;
pub use service::{ServiceError, SubmitResponse, TradingService};
