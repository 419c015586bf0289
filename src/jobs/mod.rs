//! Webhook job pipeline: queue, per-account locks and the order processor

pub mod context;
pub mod handlers;
pub mod locks;
pub mod outcomes;
pub mod queue;
pub mod types;

pub use context::JobContext;
pub use handlers::WebhookProcessor;
pub use locks::AccountLocks;
pub use outcomes::OutcomeLog;
pub use queue::{JobProcessor, WebhookQueue};
pub use types::{QueueConfig, QueueStatus, SubmitOutcome, WebhookJob};
