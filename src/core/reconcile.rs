//! Reconciliation: copy broker order state into the ledger
//!
//! Accounts are synced one after another with a pause between them. Each
//! fetch is bounded by `fetch_timeout` and retried with a constant delay
//! that doubles when the broker reports a conflict. A failing account is
//! logged and skipped; it never stops the sweep.

use crate::config::AppConfig;
use crate::db::OrderLedger;
use crate::error::{BrokerError, LedgerError};
use crate::metrics::Metrics;
use crate::models::{CredentialSlot, Order, TradingAccount};
use crate::services::broker::{Broker, HistoryQuery, Page};
use backon::{ConstantBuilder, Retryable};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub interval: Duration,
    pub account_pause: Duration,
    pub fetch_timeout: Duration,
    pub max_attempts: usize,
    pub retry_delay: Duration,
    /// Pause between the active and the closed order fetch
    pub fetch_gap: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            account_pause: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_delay: Duration::from_secs(30),
            fetch_gap: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{kind} orders: {source}")]
    Broker {
        kind: &'static str,
        #[source]
        source: BrokerError,
    },

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("account {0} needs secondary API credentials, none configured")]
    MissingCredentials(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSync {
    pub login: String,
    pub active_orders: usize,
    pub closed_orders: usize,
}

impl AccountSync {
    pub fn total(&self) -> usize {
        self.active_orders + self.closed_orders
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub synced: Vec<AccountSync>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
    pub duration_ms: u64,
}

impl SweepReport {
    pub fn orders_synced(&self) -> usize {
        self.synced.iter().map(AccountSync::total).sum()
    }
}

pub struct Reconciler {
    broker: Arc<dyn Broker>,
    ledger: OrderLedger,
    config: Arc<AppConfig>,
    settings: ReconcileConfig,
    metrics: Option<Arc<Metrics>>,
}

impl Reconciler {
    pub fn new(
        broker: Arc<dyn Broker>,
        ledger: OrderLedger,
        config: Arc<AppConfig>,
        settings: ReconcileConfig,
    ) -> Self {
        Self {
            broker,
            ledger,
            config,
            settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &ReconcileConfig {
        &self.settings
    }

    /// Monitored accounts plus the secondary-credential account
    pub fn accounts(&self) -> Vec<String> {
        let mut accounts = self.config.monitored_accounts.clone();
        if let Some(secondary) = &self.config.secondary_account {
            if !accounts.contains(secondary) {
                accounts.push(secondary.clone());
            }
        }
        accounts
    }

    /// Sync every account once
    pub async fn sweep(&self) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::default();
        info!(accounts = ?self.accounts(), "Reconciler: sweep started");

        self.pre_authenticate().await;

        for login in self.accounts() {
            if self.missing_credentials(&login) {
                info!(account = %login, "Reconciler: skipping account without secondary credentials");
                report.skipped.push(login);
                continue;
            }

            tokio::time::sleep(self.settings.account_pause).await;
            match self.sync_account(&login).await {
                Ok(sync) => report.synced.push(sync),
                Err(e) => {
                    error!(account = %login, error = %e, "Reconciler: account sync failed");
                    if let Some(metrics) = &self.metrics {
                        metrics.reconciliation_failures_total.inc();
                    }
                    report.failed.push((login, e.to_string()));
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        if let Some(metrics) = &self.metrics {
            metrics.reconciliation_sweeps_total.inc();
            metrics
                .reconciliation_orders_synced_total
                .inc_by(report.orders_synced() as u64);
        }
        info!(
            synced = report.synced.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            orders = report.orders_synced(),
            duration_ms = report.duration_ms,
            "Reconciler: sweep finished"
        );
        report
    }

    /// Fetch active and closed orders for one account and merge them into the ledger
    pub async fn sync_account(&self, login: &str) -> Result<AccountSync, SyncError> {
        if self.missing_credentials(login) {
            return Err(SyncError::MissingCredentials(login.to_string()));
        }
        let account = self.config.trading_account(login);

        let active = self
            .fetch("active", &account, || {
                self.broker.active_orders(&account, Page::all())
            })
            .await?;
        tokio::time::sleep(self.settings.fetch_gap).await;
        let closed = self
            .fetch("closed", &account, || {
                self.broker
                    .closed_orders(&account, HistoryQuery::new(Page::all()))
            })
            .await?;

        for order in active.iter().chain(closed.iter()) {
            self.ledger.upsert_order(order).await?;
        }

        let sync = AccountSync {
            login: login.to_string(),
            active_orders: active.len(),
            closed_orders: closed.len(),
        };
        info!(
            account = %login,
            active = sync.active_orders,
            closed = sync.closed_orders,
            "Reconciler: account synced"
        );
        Ok(sync)
    }

    fn missing_credentials(&self, login: &str) -> bool {
        self.config.requires_secondary(login)
            && self.config.credentials(CredentialSlot::Secondary).is_none()
    }

    /// Authenticate each configured slot up front so account fetches reuse the token
    async fn pre_authenticate(&self) {
        for slot in [CredentialSlot::Primary, CredentialSlot::Secondary] {
            if self.config.credentials(slot).is_none() {
                continue;
            }
            if let Err(e) = self.broker.authenticate(slot).await {
                warn!(slot = ?slot, error = %e, "Reconciler: pre-authentication failed");
            }
        }
    }

    async fn fetch<F, Fut>(
        &self,
        kind: &'static str,
        account: &TradingAccount,
        request: F,
    ) -> Result<Vec<Order>, SyncError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Vec<Order>, BrokerError>>,
    {
        let timeout = self.settings.fetch_timeout;
        let request = &request;
        let attempt = move || async move {
            match tokio::time::timeout(timeout, request()).await {
                Ok(result) => result,
                Err(_) => Err(BrokerError::Timeout),
            }
        };

        let backoff = ConstantBuilder::default()
            .with_delay(self.settings.retry_delay)
            .with_max_times(self.settings.max_attempts.saturating_sub(1));

        attempt
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(|e: &BrokerError| e.is_retryable())
            .adjust(|e: &BrokerError, delay: Option<Duration>| {
                if e.is_conflict() {
                    delay.map(|d| d * 2)
                } else {
                    delay
                }
            })
            .notify(|e: &BrokerError, delay: Duration| {
                warn!(
                    account = %account.login,
                    kind = kind,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Reconciler: fetch failed, retrying"
                );
            })
            .await
            .map_err(|source| {
                debug!(account = %account.login, kind = kind, "Reconciler: giving up on fetch");
                SyncError::Broker { kind, source }
            })
    }
}
