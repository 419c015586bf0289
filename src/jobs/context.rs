//! Job context for dependency injection

use crate::config::AppConfig;
use crate::db::OrderLedger;
use crate::jobs::locks::AccountLocks;
use crate::jobs::outcomes::OutcomeLog;
use crate::jobs::types::QueueConfig;
use crate::metrics::Metrics;
use crate::services::broker::Broker;
use crate::services::market_data::QuoteSource;
use crate::validation::RiskGate;
use std::sync::Arc;

/// Everything the webhook processor reads or writes
///
/// Broker and quote source are trait objects so tests can swap in
/// scripted implementations.
pub struct JobContext {
    pub broker: Arc<dyn Broker>,
    pub quotes: Arc<dyn QuoteSource>,
    pub ledger: OrderLedger,
    pub gate: RiskGate,
    pub locks: Arc<AccountLocks>,
    pub outcomes: OutcomeLog,
    pub config: Arc<AppConfig>,
    pub queue_config: QueueConfig,
    pub metrics: Option<Arc<Metrics>>,
}

impl JobContext {
    pub fn new(
        broker: Arc<dyn Broker>,
        quotes: Arc<dyn QuoteSource>,
        ledger: OrderLedger,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            broker,
            quotes,
            gate: RiskGate::new(config.supported_symbols.clone()),
            locks: Arc::new(AccountLocks::new(
                config.monitored_accounts.iter().cloned(),
                crate::jobs::locks::DEFAULT_STRIPES,
            )),
            outcomes: OutcomeLog::new(Some(ledger.clone())),
            ledger,
            config,
            queue_config: QueueConfig::default(),
            metrics: None,
        }
    }

    pub fn with_queue_config(mut self, queue_config: QueueConfig) -> Self {
        self.queue_config = queue_config;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
