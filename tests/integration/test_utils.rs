//! Shared fixtures for integration tests

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wingbot::config::AppConfig;
use wingbot::db::OrderLedger;
use wingbot::error::BrokerError;
use wingbot::jobs::QueueConfig;
use wingbot::models::{Candle, CredentialSlot, Order, Side, TradingAccount};
use wingbot::services::broker::{Broker, CandleQuery, HistoryQuery, MarketOrder, Page};

/// In-process broker with scripted responses
#[derive(Default)]
#[allow(dead_code)]
pub struct MockBroker {
    active: Mutex<HashMap<String, Vec<Order>>>,
    closed: Mutex<HashMap<String, Vec<Order>>>,
    hanging: Mutex<HashSet<String>>,
    placements: Mutex<Vec<(String, MarketOrder)>>,
    candles: Mutex<Option<Vec<Candle>>>,
    status: Mutex<Option<Value>>,
    active_errors: Mutex<HashMap<String, VecDeque<BrokerError>>>,
    closed_all: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    active_calls: AtomicUsize,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_active(&self, login: &str, orders: Vec<Order>) {
        self.active.lock().unwrap().insert(login.to_string(), orders);
    }

    pub fn set_closed(&self, login: &str, orders: Vec<Order>) {
        self.closed.lock().unwrap().insert(login.to_string(), orders);
    }

    /// Requests for this account never answer
    pub fn hang(&self, login: &str) {
        self.hanging.lock().unwrap().insert(login.to_string());
    }

    pub fn set_candles(&self, candles: Vec<Candle>) {
        *self.candles.lock().unwrap() = Some(candles);
    }

    /// Account status answer; without one the broker reports 503
    pub fn set_status(&self, status: Value) {
        *self.status.lock().unwrap() = Some(status);
    }

    /// Errors returned, in order, by the next active-order fetches for `login`
    pub fn fail_active(&self, login: &str, errors: Vec<BrokerError>) {
        self.active_errors
            .lock()
            .unwrap()
            .insert(login.to_string(), errors.into());
    }

    pub fn closed_all(&self) -> Vec<String> {
        self.closed_all.lock().unwrap().clone()
    }

    pub fn placements(&self) -> Vec<(String, MarketOrder)> {
        self.placements.lock().unwrap().clone()
    }

    pub fn placement_count(&self) -> usize {
        self.placements.lock().unwrap().len()
    }

    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::SeqCst)
    }

    async fn maybe_hang(&self, login: &str) {
        let hangs = self.hanging.lock().unwrap().contains(login);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn authenticate(&self, _slot: CredentialSlot) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn account_status(&self, account: &TradingAccount) -> Result<Value, BrokerError> {
        self.status
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BrokerError::Http {
                status: 503,
                message: format!("account {} unavailable", account.login),
            })
    }

    async fn active_orders(
        &self,
        account: &TradingAccount,
        _page: Page,
    ) -> Result<Vec<Order>, BrokerError> {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_hang(&account.login).await;
        let scripted = self
            .active_errors
            .lock()
            .unwrap()
            .get_mut(&account.login)
            .and_then(|errors| errors.pop_front());
        if let Some(err) = scripted {
            return Err(err);
        }
        Ok(self
            .active
            .lock()
            .unwrap()
            .get(&account.login)
            .cloned()
            .unwrap_or_default())
    }

    async fn closed_orders(
        &self,
        account: &TradingAccount,
        _query: HistoryQuery,
    ) -> Result<Vec<Order>, BrokerError> {
        self.maybe_hang(&account.login).await;
        Ok(self
            .closed
            .lock()
            .unwrap()
            .get(&account.login)
            .cloned()
            .unwrap_or_default())
    }

    async fn place_market_order(
        &self,
        account: &TradingAccount,
        order: &MarketOrder,
    ) -> Result<Order, BrokerError> {
        self.placements
            .lock()
            .unwrap()
            .push((account.login.clone(), order.clone()));
        let id = 9000 + self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut placed = Order::new(
            id.to_string(),
            account.login.clone(),
            order.symbol.clone(),
            order.side,
            order.volume,
            account.reality,
        );
        placed.take_profit = order.take_profit;
        placed.stop_loss = order.stop_loss;
        placed.open_time = Some(Utc::now().timestamp_millis());
        Ok(placed)
    }

    async fn candles(&self, _query: CandleQuery) -> Result<Vec<Candle>, BrokerError> {
        self.candles
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BrokerError::Connection("candles offline".to_string()))
    }

    async fn close_all(&self, account: &TradingAccount) -> Result<Value, BrokerError> {
        self.closed_all.lock().unwrap().push(account.login.clone());
        Ok(json!({ "closed": 0 }))
    }

    async fn deposit_history(&self, account: &TradingAccount) -> Result<Value, BrokerError> {
        Ok(json!({ "login": account.login, "deposits": [] }))
    }
}

#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        default_account: "100".to_string(),
        monitored_accounts: vec!["100".to_string(), "200".to_string()],
        live_accounts: vec!["200".to_string()],
        supported_symbols: vec![
            "EURUSD".to_string(),
            "USDJPY".to_string(),
            "US100".to_string(),
        ],
        ..AppConfig::default()
    }
}

#[allow(dead_code)]
pub fn fast_queue_config() -> QueueConfig {
    QueueConfig {
        max_retries: 2,
        retry_delay: Duration::from_millis(10),
        duplicate_window: Duration::from_secs(30),
        inter_job_pause: Duration::from_millis(1),
        quote_wait: Duration::from_millis(5),
    }
}

#[allow(dead_code)]
pub async fn ledger() -> OrderLedger {
    OrderLedger::in_memory()
        .await
        .expect("in-memory ledger")
}

#[allow(dead_code)]
pub fn order(id: &str, login: &str, side: Side) -> Order {
    Order::new(id, login, "EURUSD", side, 0.01, wingbot::models::Reality::Demo)
}

#[allow(dead_code)]
pub fn buy_payload(id: &str, account: &str) -> Value {
    json!({
        "id": id,
        "a": "B",
        "sy": "EURUSD",
        "z": 0.01,
        "m": 0.05,
        "t": 15,
        "s": 10,
        "l": account,
        "tf": "15m",
        "ft": "trend"
    })
}
