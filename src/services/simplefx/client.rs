//! SimpleFX REST client

use super::auth::{AuthConfig, TokenManager};
use super::messages::{
    login_value, ActiveOrdersRequest, ApiErrorBody, BrokerOrder, CandlesData, CloseAllRequest,
    Envelope, MarketOrderRequest, MarketOrdersData, OrderHistoryRequest,
};
use crate::config::{AppConfig, Credentials};
use crate::error::BrokerError;
use crate::metrics::Metrics;
use crate::models::instrument::{round_to, InstrumentSpec};
use crate::models::{Candle, CredentialSlot, Order, Side, TradingAccount};
use crate::services::broker::{Broker, CandleQuery, HistoryQuery, MarketOrder, Page};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const ORDER_ACTIVITY: &str = "TradingView Webhook Order";

pub struct SimpleFxClient {
    http: reqwest::Client,
    base_url: String,
    auth: TokenManager,
    metrics: Option<Arc<Metrics>>,
}

impl SimpleFxClient {
    /// Build a client from application configuration
    pub fn new(config: &AppConfig) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut credentials = HashMap::new();
        for slot in [CredentialSlot::Primary, CredentialSlot::Secondary] {
            if let Some(c) = config.credentials(slot) {
                credentials.insert(slot, c.clone());
            }
        }

        Ok(Self::with_client(
            &config.api_url,
            http,
            credentials,
            AuthConfig::default(),
        ))
    }

    pub fn with_client(
        base_url: impl Into<String>,
        http: reqwest::Client,
        credentials: HashMap<CredentialSlot, Credentials>,
        auth_config: AuthConfig,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let auth = TokenManager::new(http.clone(), &base_url, credentials, auth_config);
        Self {
            http,
            base_url,
            auth,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.auth = self.auth.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    pub fn has_credentials(&self, slot: CredentialSlot) -> bool {
        self.auth.has_credentials(slot)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated request, refreshing the token once on 401
    async fn send<T, F>(&self, slot: CredentialSlot, build: F) -> Result<T, BrokerError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut refreshed = false;
        loop {
            let token = self.auth.token(slot).await?;
            if let Some(metrics) = &self.metrics {
                metrics.broker_requests_total.inc();
            }

            let response = build(&self.http).bearer_auth(&token).send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                self.auth.invalidate(slot, &token).await;
                if refreshed {
                    return Err(BrokerError::Unauthorized);
                }
                warn!(slot = ?slot, "SimpleFxClient: 401 received, retrying with a fresh token");
                refreshed = true;
                continue;
            }

            let body = response.text().await?;
            if !status.is_success() {
                return Err(BrokerError::Http {
                    status: status.as_u16(),
                    message: ApiErrorBody::describe(&body),
                });
            }

            return serde_json::from_str(&body).map_err(Into::into);
        }
    }

    /// Requests answering with `data.marketOrders`; a missing list is empty
    async fn fetch_orders(
        &self,
        slot: CredentialSlot,
        build: impl Fn(&reqwest::Client) -> RequestBuilder,
    ) -> Result<Vec<BrokerOrder>, BrokerError> {
        let envelope: Envelope<MarketOrdersData> = self.send(slot, build).await?;
        Ok(envelope
            .data
            .map(|d| d.market_orders)
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.into_order())
            .collect())
    }
}

/// Map a wire order onto the ledger record for `account`.
///
/// Fields the broker left out stay `None`, so the ledger merge keeps the
/// values recorded at placement.
pub fn to_order(order: BrokerOrder, account: &TradingAccount) -> Order {
    let mut mapped = Order::partial(
        order.id,
        order.login.unwrap_or_else(|| account.login.clone()),
        account.reality,
    );
    mapped.symbol = order.symbol.filter(|s| !s.is_empty());
    mapped.side = order.side.as_deref().and_then(Side::from_code);
    mapped.volume = order.volume;
    mapped.open_price = order.open_price;
    mapped.close_price = order.close_price;
    mapped.take_profit = order.take_profit;
    mapped.stop_loss = order.stop_loss;
    mapped.open_time = order.open_time;
    mapped.close_time = order.close_time;
    mapped.profit = order.profit;
    mapped.swap = order.swaps;
    mapped.commission = order.commission;
    mapped.leverage = order.leverage;
    mapped.margin = order.margin;
    mapped.margin_rate = order.margin_rate;
    mapped.request_id = order.request_id.filter(|r| !r.is_empty());
    mapped.is_fifo = order.is_fifo;
    mapped
}

#[async_trait]
impl Broker for SimpleFxClient {
    async fn authenticate(&self, slot: CredentialSlot) -> Result<(), BrokerError> {
        self.auth.token(slot).await.map(|_| ())
    }

    async fn account_status(&self, account: &TradingAccount) -> Result<Value, BrokerError> {
        let url = self.url(&format!(
            "/accounts/{}/{}",
            account.reality.as_str(),
            account.login
        ));
        let body: Value = self.send(account.slot, |http| http.get(&url)).await?;
        Ok(body.get("data").cloned().unwrap_or(body))
    }

    async fn active_orders(
        &self,
        account: &TradingAccount,
        page: Page,
    ) -> Result<Vec<Order>, BrokerError> {
        let url = self.url("/trading/orders/active");
        let request = ActiveOrdersRequest {
            login: login_value(&account.login),
            reality: account.reality.as_str(),
            page: page.page,
            limit: page.limit,
        };
        let orders: Vec<Order> = self
            .fetch_orders(account.slot, |http| http.post(&url).json(&request))
            .await?
            .into_iter()
            .map(|o| to_order(o, account))
            .collect();
        debug!(account = %account.login, count = orders.len(), "SimpleFxClient: fetched active orders");
        Ok(orders)
    }

    async fn closed_orders(
        &self,
        account: &TradingAccount,
        query: HistoryQuery,
    ) -> Result<Vec<Order>, BrokerError> {
        let (from, to) = query.window(Utc::now());
        let url = self.url("/trading/orders/history");
        let request = OrderHistoryRequest {
            login: login_value(&account.login),
            reality: account.reality.as_str(),
            time_from: from.timestamp_millis(),
            time_to: to.timestamp_millis(),
            page: query.page.page,
            limit: query.page.limit,
        };
        let orders: Vec<Order> = self
            .fetch_orders(account.slot, |http| http.post(&url).json(&request))
            .await?
            .into_iter()
            .map(|o| to_order(o, account))
            .collect();
        debug!(account = %account.login, count = orders.len(), "SimpleFxClient: fetched closed orders");
        Ok(orders)
    }

    async fn place_market_order(
        &self,
        account: &TradingAccount,
        order: &MarketOrder,
    ) -> Result<Order, BrokerError> {
        let spec = InstrumentSpec::lookup(&order.symbol);
        if order.volume < spec.min_volume() {
            return Err(BrokerError::VolumeBelowMinimum {
                symbol: order.symbol.clone(),
                volume: order.volume,
                minimum: spec.min_volume(),
            });
        }

        let url = self.url("/trading/orders/market");
        let request = MarketOrderRequest {
            reality: account.reality.as_str(),
            login: login_value(&account.login),
            symbol: &order.symbol,
            side: order.side.as_str(),
            volume: order.volume,
            take_profit: order.take_profit.map(|p| spec.round_price(p)),
            stop_loss: order.stop_loss.map(|p| spec.round_price(p)),
            is_fifo: false,
            request_id: format!("TV_{}", Utc::now().timestamp_millis()),
            activity: ORDER_ACTIVITY,
        };

        info!(
            account = %account.login,
            symbol = %order.symbol,
            side = %order.side,
            volume = order.volume,
            take_profit = ?request.take_profit,
            stop_loss = ?request.stop_loss,
            "SimpleFxClient: placing market order"
        );

        let mut placed = self
            .fetch_orders(account.slot, |http| http.post(&url).json(&request))
            .await?
            .into_iter()
            .next()
            .ok_or(BrokerError::EmptyResponse)?;
        placed.symbol.get_or_insert_with(|| order.symbol.clone());
        placed.side.get_or_insert_with(|| order.side.as_str().to_string());
        placed.volume.get_or_insert(order.volume);
        let placed = to_order(placed, account);

        info!(account = %account.login, order_id = %placed.order_id, "SimpleFxClient: order placed");
        Ok(placed)
    }

    async fn candles(&self, query: CandleQuery) -> Result<Vec<Candle>, BrokerError> {
        let (from, to) = query.window(Utc::now());
        let url = self.url(&format!(
            "/market/candles/{}/{}",
            query.symbol,
            query.timeframe.broker_code()
        ));
        let params = [("from", from.timestamp()), ("to", to.timestamp())];

        let envelope: Envelope<CandlesData> = self
            .send(CredentialSlot::Primary, |http| http.get(&url).query(&params))
            .await?;

        let candles = envelope
            .data
            .map(|d| d.candles)
            .unwrap_or_default()
            .into_iter()
            .map(|c| Candle {
                time: c.timestamp,
                open: round_to(c.open, 5),
                high: round_to(c.high, 5),
                low: round_to(c.low, 5),
                close: round_to(c.close, 5),
            })
            .collect();
        Ok(candles)
    }

    async fn close_all(&self, account: &TradingAccount) -> Result<Value, BrokerError> {
        let url = self.url("/trading/orders/close-all");
        let request = CloseAllRequest {
            login: login_value(&account.login),
            reality: account.reality.as_str(),
        };
        warn!(account = %account.login, reality = %account.reality, "SimpleFxClient: closing all positions");
        self.send(account.slot, |http| http.post(&url).json(&request))
            .await
    }

    async fn deposit_history(&self, account: &TradingAccount) -> Result<Value, BrokerError> {
        let url = self.url(&format!(
            "/accounts/{}/{}/deposits",
            account.reality.as_str(),
            account.login
        ));
        let body: Value = self
            .send(CredentialSlot::Primary, |http| http.get(&url))
            .await?;
        debug!(account = %account.login, "SimpleFxClient: fetched deposit history");
        Ok(body.get("data").cloned().unwrap_or(body))
    }
}
