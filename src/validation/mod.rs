//! Pre-trade validation: ordered risk checks and order pricing

pub mod gate;
pub mod pricing;

pub use gate::{GateInput, RiskGate, Verdict};
pub use pricing::{plan_order, stop_loss_price, OrderPlan};
