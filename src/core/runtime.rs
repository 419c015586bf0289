//! Wiring of every long-lived component from the application configuration

use crate::config::AppConfig;
use crate::core::http::AppState;
use crate::core::reconcile::{ReconcileConfig, Reconciler};
use crate::core::scheduler::ReconciliationScheduler;
use crate::core::service::TradingService;
use crate::db::OrderLedger;
use crate::error::{BrokerError, LedgerError, SchedulerError};
use crate::jobs::{JobContext, QueueConfig, WebhookProcessor, WebhookQueue};
use crate::metrics::Metrics;
use crate::models::CredentialSlot;
use crate::services::broker::Broker;
use crate::services::simplefx::{FeedConfig, QuoteFeed, SimpleFxClient};
use crate::services::websocket::QuoteFeedService;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("broker client: {0}")]
    Broker(#[from] BrokerError),
}

/// Configuration for the runtime
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub queue: QueueConfig,
    pub reconcile: ReconcileConfig,
}

pub struct Runtime {
    pub config: Arc<AppConfig>,
    pub metrics: Arc<Metrics>,
    pub ledger: OrderLedger,
    pub broker: Arc<SimpleFxClient>,
    pub feed: QuoteFeedService,
    pub queue: Arc<WebhookQueue>,
    pub reconciler: Arc<Reconciler>,
    pub service: Arc<TradingService>,
}

impl Runtime {
    pub async fn build(config: AppConfig, runtime_config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let config = Arc::new(config);
        let metrics = Arc::new(Metrics::new()?);

        let ledger = OrderLedger::connect(&config.database_url, config.database_max_connections).await?;
        metrics.database_connected.set(1.0);
        info!(url = %config.database_url, "Runtime: ledger ready");

        if config.credentials(CredentialSlot::Primary).is_none() {
            warn!("Runtime: SIMPLEFX_API_KEY/SIMPLEFX_API_SECRET not set, broker calls will fail");
        }
        let broker = Arc::new(SimpleFxClient::new(&config)?.with_metrics(metrics.clone()));
        let broker_dyn: Arc<dyn Broker> = broker.clone();

        let feed = Arc::new(
            QuoteFeed::new(FeedConfig::new(
                config.quotes_url.clone(),
                config.supported_symbols.clone(),
            ))
            .with_metrics(metrics.clone()),
        );

        let context = JobContext::new(broker_dyn.clone(), feed.clone(), ledger.clone(), config.clone())
            .with_queue_config(runtime_config.queue.clone())
            .with_metrics(metrics.clone());
        let processor = Arc::new(WebhookProcessor::new(Arc::new(context)));
        let queue = Arc::new(
            WebhookQueue::new(processor, runtime_config.queue)
                .with_ledger(ledger.clone())
                .with_metrics(metrics.clone()),
        );
        queue.restore().await?;

        let reconciler = Arc::new(
            Reconciler::new(
                broker_dyn.clone(),
                ledger.clone(),
                config.clone(),
                runtime_config.reconcile,
            )
            .with_metrics(metrics.clone()),
        );

        let service = Arc::new(TradingService::new(
            config.clone(),
            queue.clone(),
            ledger.clone(),
            broker_dyn,
            reconciler.clone(),
        ));

        Ok(Self {
            config,
            metrics,
            ledger,
            broker,
            feed: QuoteFeedService::new(feed),
            queue,
            reconciler,
            service,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.service.clone(), self.metrics.clone()).with_feed(self.feed.feed())
    }

    /// Start the quote feed and wait briefly for its first connection
    pub async fn start_feed(&self, wait: Duration) -> bool {
        self.feed.start().await;
        let ready = self.feed.wait_ready(wait).await;
        if !ready {
            warn!("Runtime: quote feed not connected yet, it keeps retrying in the background");
        }
        ready
    }

    pub fn scheduler(&self) -> Result<ReconciliationScheduler, SchedulerError> {
        ReconciliationScheduler::new(self.reconciler.clone(), self.config.reconcile_interval_seconds)
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        self.feed.stop().await;
        info!("Runtime: shut down");
    }
}
