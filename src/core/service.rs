//! Trading service facade shared by the HTTP adapter and the binaries

use crate::config::AppConfig;
use crate::core::reconcile::{AccountSync, Reconciler, SyncError};
use crate::db::OrderLedger;
use crate::error::{AlertError, BrokerError, LedgerError};
use crate::jobs::{QueueStatus, SubmitOutcome, WebhookQueue};
use crate::models::{
    AccountSettings, Alert, Candle, CredentialSlot, Order, Reality, Side, Timeframe,
    TradingAccount, WebhookOutcome,
};
use crate::services::broker::{Broker, CandleQuery, HistoryQuery, Page};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 1000;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidAlert(#[from] AlertError),

    #[error("webhook queue is shutting down")]
    QueueClosed,

    #[error("broker request failed: {0}")]
    Broker(#[from] BrokerError),

    #[error("{0}")]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Sync(#[from] SyncError),
}

/// Body returned for every webhook submission
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_status: Option<QueueStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub login: String,
    pub reality: Reality,
    pub secondary_credentials: bool,
}

/// Open volume per side across the active orders
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCounts {
    pub buy_volume: f64,
    pub sell_volume: f64,
}

/// Live account view: broker status, positions and P&L
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub login: String,
    pub reality: Reality,
    pub account_status: Value,
    pub active_orders: Vec<Order>,
    pub closed_orders: Vec<Order>,
    #[serde(rename = "unrealizedPnL")]
    pub unrealized_pnl: f64,
    #[serde(rename = "realizedPnL")]
    pub realized_pnl: f64,
    pub order_counts: OrderCounts,
    pub server_time: DateTime<Utc>,
}

impl AccountStatus {
    pub fn new(
        account: &TradingAccount,
        account_status: Value,
        active_orders: Vec<Order>,
        closed_orders: Vec<Order>,
    ) -> Self {
        let profit = |orders: &[Order]| orders.iter().filter_map(|o| o.profit).sum::<f64>();
        let volume = |side: Side| {
            active_orders
                .iter()
                .filter(|o| o.side == Some(side))
                .filter_map(|o| o.volume)
                .sum::<f64>()
        };

        Self {
            login: account.login.clone(),
            reality: account.reality,
            unrealized_pnl: profit(&active_orders),
            realized_pnl: profit(&closed_orders),
            order_counts: OrderCounts {
                buy_volume: volume(Side::Buy),
                sell_volume: volume(Side::Sell),
            },
            account_status,
            active_orders,
            closed_orders,
            server_time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candles: Vec<Candle>,
    pub orders: Vec<Order>,
}

pub struct TradingService {
    config: Arc<AppConfig>,
    queue: Arc<WebhookQueue>,
    ledger: OrderLedger,
    broker: Arc<dyn Broker>,
    reconciler: Arc<Reconciler>,
}

impl TradingService {
    pub fn new(
        config: Arc<AppConfig>,
        queue: Arc<WebhookQueue>,
        ledger: OrderLedger,
        broker: Arc<dyn Broker>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            config,
            queue,
            ledger,
            broker,
            reconciler,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<WebhookQueue> {
        &self.queue
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    /// Parse and enqueue an alert payload
    pub async fn submit_alert(&self, payload: &Value) -> Result<SubmitResponse, ServiceError> {
        let started = Instant::now();
        let alert = Alert::from_payload(payload, &self.config.default_account, Utc::now())?;

        match self.queue.submit(alert).await {
            SubmitOutcome::Queued { job_id, status } => Ok(SubmitResponse {
                success: true,
                message: Some("Webhook queued for processing".to_string()),
                job_id: Some(job_id),
                queue_status: Some(status),
                processing_time_ms: Some(started.elapsed().as_millis() as u64),
                ..Default::default()
            }),
            SubmitOutcome::Duplicate => Ok(SubmitResponse {
                success: true,
                duplicate: Some(true),
                message: Some("Duplicate webhook ignored".to_string()),
                ..Default::default()
            }),
            SubmitOutcome::Closed => Err(ServiceError::QueueClosed),
        }
    }

    pub async fn queue_status(&self) -> QueueStatus {
        self.queue.status().await
    }

    pub fn accounts(&self) -> Vec<AccountSummary> {
        self.reconciler
            .accounts()
            .into_iter()
            .map(|login| {
                let account = self.config.trading_account(&login);
                AccountSummary {
                    reality: account.reality,
                    secondary_credentials: account.slot == CredentialSlot::Secondary,
                    login,
                }
            })
            .collect()
    }

    pub async fn recent_orders(&self, login: &str, limit: u32) -> Result<Vec<Order>, ServiceError> {
        Ok(self.ledger.get_recent_orders(login, clamp_limit(limit)).await?)
    }

    pub async fn outcomes(
        &self,
        login: &str,
        limit: u32,
    ) -> Result<Vec<WebhookOutcome>, ServiceError> {
        Ok(self
            .ledger
            .get_webhook_outcomes(login, clamp_limit(limit))
            .await?)
    }

    pub async fn log_entries(&self, limit: u32) -> Result<Vec<WebhookOutcome>, ServiceError> {
        Ok(self.ledger.get_recent_log_entries(clamp_limit(limit)).await?)
    }

    pub async fn settings(&self, login: &str) -> Result<AccountSettings, ServiceError> {
        Ok(self.ledger.get_account_settings(login).await?)
    }

    /// Live status, positions and P&L straight from the broker.
    ///
    /// An unreachable status call fails the request; order lists that fail
    /// degrade to empty.
    pub async fn account_status(&self, login: &str) -> Result<AccountStatus, ServiceError> {
        let account = self.config.trading_account(login);
        let (status, active, closed) = tokio::join!(
            self.broker.account_status(&account),
            self.broker.active_orders(&account, Page::all()),
            self.broker
                .closed_orders(&account, HistoryQuery::new(Page::all())),
        );
        let status = status?;

        let active = active.unwrap_or_else(|e| {
            warn!(account = %login, error = %e, "TradingService: active orders unavailable");
            Vec::new()
        });
        let closed = closed.unwrap_or_else(|e| {
            warn!(account = %login, error = %e, "TradingService: closed orders unavailable");
            Vec::new()
        });

        Ok(AccountStatus::new(&account, status, active, closed))
    }

    pub async fn deposit_history(&self, login: &str) -> Result<Value, ServiceError> {
        let account = self.config.trading_account(login);
        Ok(self.broker.deposit_history(&account).await?)
    }

    /// Close every open position of the account at market
    pub async fn close_all(&self, login: &str) -> Result<Value, ServiceError> {
        let account = self.config.trading_account(login);
        warn!(account = %login, "TradingService: close-all requested");
        Ok(self.broker.close_all(&account).await?)
    }

    /// Candles plus the account's orders for a symbol; failures degrade to empty lists
    pub async fn chart(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: Option<i64>,
        login: Option<&str>,
    ) -> ChartData {
        let symbol = symbol.trim().to_uppercase();
        let mut query = CandleQuery::new(&symbol, timeframe);
        if let Some(bars) = bars.filter(|b| *b > 0) {
            let now = Utc::now();
            query.to = Some(now);
            query.from = Some(now - ChronoDuration::seconds(timeframe.seconds() * bars));
        }

        let candles = match self.broker.candles(query).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "TradingService: candles unavailable");
                Vec::new()
            }
        };

        let login = login.unwrap_or(&self.config.default_account);
        let orders = match self.ledger.get_orders_for_symbol(login, &symbol).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(symbol = %symbol, account = %login, error = %e, "TradingService: chart orders unavailable");
                Vec::new()
            }
        };

        debug!(symbol = %symbol, candles = candles.len(), orders = orders.len(), "TradingService: chart data");
        ChartData {
            symbol,
            timeframe,
            candles,
            orders,
        }
    }

    pub async fn sync_account(&self, login: &str) -> Result<AccountSync, ServiceError> {
        Ok(self.reconciler.sync_account(login).await?)
    }
}

fn clamp_limit(limit: u32) -> u32 {
    if limit == 0 {
        DEFAULT_LIST_LIMIT
    } else {
        limit.min(MAX_LIST_LIMIT)
    }
}
