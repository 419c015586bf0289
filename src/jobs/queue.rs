//! In-process FIFO queue for webhook jobs
//!
//! A single drain task processes jobs one at a time. Retryable failures
//! are re-appended after `retry_delay`; everything else is final. A key is
//! remembered as processed once its job succeeds or is rejected, and that
//! set is persisted so restarts keep rejecting duplicates.

use crate::db::OrderLedger;
use crate::error::{LedgerError, ProcessError};
use crate::jobs::outcomes::OutcomeLog;
use crate::jobs::types::{QueueConfig, QueueStatus, SubmitOutcome, WebhookJob};
use crate::metrics::Metrics;
use crate::models::{Alert, Order, ProcessedAlertKey};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Runs a single job attempt
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &WebhookJob) -> Result<Order, ProcessError>;
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<WebhookJob>,
    processing: bool,
    processed: HashSet<ProcessedAlertKey>,
    recent: HashMap<ProcessedAlertKey, Instant>,
    pending_retries: usize,
    closed: bool,
}

impl QueueState {
    fn is_duplicate(&mut self, key: &ProcessedAlertKey, window: Duration) -> bool {
        let now = Instant::now();
        self.recent.retain(|_, seen| now.duration_since(*seen) < window);

        self.processed.contains(key)
            || self.recent.contains_key(key)
            || self.jobs.iter().any(|job| &job.key() == key)
    }

    fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.jobs.len(),
            processing: self.processing,
            processed_ids_count: self.processed.len(),
        }
    }
}

pub struct WebhookQueue {
    processor: Arc<dyn JobProcessor>,
    config: QueueConfig,
    state: Mutex<QueueState>,
    ledger: Option<OrderLedger>,
    outcomes: OutcomeLog,
    metrics: Option<Arc<Metrics>>,
}

impl WebhookQueue {
    pub fn new(processor: Arc<dyn JobProcessor>, config: QueueConfig) -> Self {
        Self {
            processor,
            config,
            state: Mutex::new(QueueState::default()),
            ledger: None,
            outcomes: OutcomeLog::default(),
            metrics: None,
        }
    }

    /// Persist processed keys and outcomes to the ledger
    pub fn with_ledger(mut self, ledger: OrderLedger) -> Self {
        self.outcomes = OutcomeLog::new(Some(ledger.clone()));
        self.ledger = Some(ledger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load previously processed keys; call once before accepting alerts
    pub async fn restore(&self) -> Result<usize, LedgerError> {
        let Some(ledger) = &self.ledger else {
            return Ok(0);
        };
        let keys = ledger.load_processed_keys().await?;
        let mut state = self.state.lock().await;
        state.processed.extend(keys);
        info!(count = state.processed.len(), "WebhookQueue: loaded processed alert ids");
        Ok(state.processed.len())
    }

    pub async fn status(&self) -> QueueStatus {
        self.state.lock().await.status()
    }

    pub async fn is_duplicate(&self, key: &ProcessedAlertKey) -> bool {
        self.state
            .lock()
            .await
            .is_duplicate(key, self.config.duplicate_window)
    }

    /// Accept an alert unless it duplicates one already seen
    pub async fn submit(self: &Arc<Self>, alert: Alert) -> SubmitOutcome {
        let key = alert.key();
        let (job, status, start_drain) = {
            let mut state = self.state.lock().await;
            if state.closed {
                return SubmitOutcome::Closed;
            }
            if state.is_duplicate(&key, self.config.duplicate_window) {
                drop(state);
                debug!(key = %key, "WebhookQueue: duplicate alert");
                if let Some(metrics) = &self.metrics {
                    metrics.webhooks_duplicate_total.inc();
                }
                self.outcomes.duplicate(&alert).await;
                return SubmitOutcome::Duplicate;
            }

            let job = WebhookJob::new(alert);
            state.recent.insert(key, Instant::now());
            state.jobs.push_back(job.clone());
            let start_drain = !state.processing;
            state.processing = true;
            (job, state.status(), start_drain)
        };

        if let Some(metrics) = &self.metrics {
            metrics.webhooks_received_total.inc();
            metrics.queue_length.set(status.queue_length as i64);
        }
        self.outcomes.received(&job.alert, &job.id).await;
        debug!(job_id = %job.id, queue_length = status.queue_length, "WebhookQueue: job queued");

        if start_drain {
            self.spawn_drain();
        }

        SubmitOutcome::Queued {
            job_id: job.id,
            status,
        }
    }

    /// Stop accepting work; queued jobs and pending retries are dropped
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        let dropped = state.jobs.len();
        state.jobs.clear();
        info!(dropped = dropped, "WebhookQueue: shutting down");
    }

    /// Wait until no job is queued, running or waiting for a retry
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let state = self.state.lock().await;
                if state.jobs.is_empty() && !state.processing && state.pending_retries == 0 {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn spawn_drain(self: &Arc<Self>) {
        let queue = self.clone();
        tokio::spawn(async move { queue.drain().await });
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let job = {
                let mut state = self.state.lock().await;
                match state.jobs.pop_front() {
                    Some(job) if !state.closed => job,
                    _ => {
                        state.processing = false;
                        break;
                    }
                }
            };

            self.run_job(job).await;

            if let Some(metrics) = &self.metrics {
                metrics
                    .queue_length
                    .set(self.state.lock().await.jobs.len() as i64);
            }
            tokio::time::sleep(self.config.inter_job_pause).await;
        }
        debug!("WebhookQueue: drained");
    }

    async fn run_job(self: &Arc<Self>, mut job: WebhookJob) {
        let key = job.key();
        match self.processor.process(&job).await {
            Ok(order) => {
                info!(job_id = %job.id, order_id = %order.order_id, "WebhookQueue: job completed");
                self.mark_processed(key).await;
            }
            Err(e) if e.is_retryable() => {
                if let Some(metrics) = &self.metrics {
                    metrics.job_failures_total.inc();
                }
                let closed = self.state.lock().await.closed;
                if job.retries < self.config.max_retries && !closed {
                    job.retries += 1;
                    warn!(
                        job_id = %job.id,
                        error = %e,
                        retry = job.retries,
                        max_retries = self.config.max_retries,
                        "WebhookQueue: job failed, scheduling retry"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.job_retries_total.inc();
                    }
                    self.schedule_retry(job).await;
                } else {
                    error!(
                        job_id = %job.id,
                        error = %e,
                        retries = job.retries,
                        "WebhookQueue: job failed permanently"
                    );
                }
            }
            Err(e @ ProcessError::Rejected(_)) => {
                info!(job_id = %job.id, reason = %e, "WebhookQueue: job rejected");
                self.mark_processed(key).await;
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.job_failures_total.inc();
                }
                error!(job_id = %job.id, error = %e, "WebhookQueue: job failed");
            }
        }
    }

    async fn schedule_retry(self: &Arc<Self>, job: WebhookJob) {
        self.state.lock().await.pending_retries += 1;
        let queue = self.clone();
        let delay = self.config.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let start_drain = {
                let mut state = queue.state.lock().await;
                state.pending_retries -= 1;
                if state.closed {
                    debug!(job_id = %job.id, "WebhookQueue: retry dropped on shutdown");
                    return;
                }
                state.jobs.push_back(job);
                let start = !state.processing;
                state.processing = true;
                start
            };
            if start_drain {
                queue.spawn_drain();
            }
        });
    }

    async fn mark_processed(&self, key: ProcessedAlertKey) {
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.mark_processed(&key).await {
                error!(error = %e, key = %key, "WebhookQueue: failed to persist processed alert id");
            }
        }
        self.state.lock().await.processed.insert(key);
    }
}
