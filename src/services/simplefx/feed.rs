//! Live bid/ask stream from the SimpleFX quote websocket
//!
//! The connection loop runs until its task is aborted. Any transport error
//! or close drops the feed back to `Disconnected`, waits `reconnect_delay`
//! and dials again, re-sending the subscriptions on every connect.

use super::messages::{
    StreamMessage, StreamQuote, StreamRequest, LAST_PRICES_PATH, QUOTES_PATH, SUBSCRIBE_PATH,
};
use crate::metrics::Metrics;
use crate::models::Quote;
use crate::services::market_data::QuoteSource;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub symbols: Vec<String>,
    pub reconnect_delay: Duration,
}

impl FeedConfig {
    pub fn new(url: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            url: url.into(),
            symbols,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Connected,
}

/// Receives every quote update published by the feed
#[async_trait]
pub trait QuoteObserver: Send + Sync {
    async fn on_quote(&self, quote: &Quote);
}

/// Adapts a plain closure into a [`QuoteObserver`]
pub struct FnObserver<F>(pub F);

#[async_trait]
impl<F> QuoteObserver for FnObserver<F>
where
    F: Fn(&Quote) + Send + Sync,
{
    async fn on_quote(&self, quote: &Quote) {
        (self.0)(quote)
    }
}

pub struct QuoteFeed {
    config: FeedConfig,
    quotes: RwLock<HashMap<String, Quote>>,
    state: RwLock<FeedState>,
    events: broadcast::Sender<Quote>,
    request_id: AtomicU64,
    metrics: Option<Arc<Metrics>>,
}

impl QuoteFeed {
    pub fn new(config: FeedConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            quotes: RwLock::new(HashMap::new()),
            state: RwLock::new(FeedState::Disconnected),
            events,
            request_id: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    pub async fn state(&self) -> FeedState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == FeedState::Connected
    }

    /// Wait until the feed reports `Connected`, up to `timeout`
    pub async fn wait_for_connection(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.is_connected().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        self.is_connected().await
    }

    /// Typed stream of every quote update
    pub fn subscribe(&self) -> broadcast::Receiver<Quote> {
        self.events.subscribe()
    }

    /// Register an observer; it is driven by its own task until the feed is dropped
    pub fn add_observer(&self, observer: Arc<dyn QuoteObserver>) -> JoinHandle<()> {
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(quote) => observer.on_quote(&quote).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "QuoteFeed: observer lagging, updates skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Apply one inbound stream message; returns the number of quotes updated
    pub async fn apply_message(&self, text: &str) -> usize {
        let message: StreamMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, "QuoteFeed: ignoring unparseable message");
                return 0;
            }
        };

        if message.p != QUOTES_PATH && message.p != LAST_PRICES_PATH {
            return 0;
        }

        let mut updated = 0;
        for entry in message.d {
            let raw: StreamQuote = match serde_json::from_value(entry) {
                Ok(q) => q,
                Err(e) => {
                    debug!(error = %e, "QuoteFeed: ignoring malformed quote");
                    continue;
                }
            };
            let quote = Quote::new(
                raw.s,
                raw.b,
                raw.a,
                raw.t.unwrap_or_else(|| Utc::now().timestamp_millis()),
            );

            self.quotes
                .write()
                .await
                .insert(quote.symbol.clone(), quote.clone());
            if let Some(metrics) = &self.metrics {
                metrics.quote_updates_total.inc();
            }
            // No receivers is fine.
            let _ = self.events.send(quote);
            updated += 1;
        }
        updated
    }

    /// Connect, stream and reconnect until the task running it is aborted
    pub async fn run(self: Arc<Self>) {
        loop {
            self.set_state(FeedState::Connecting).await;
            info!(url = %self.config.url, "QuoteFeed: connecting");

            match self.stream_once().await {
                Ok(()) => warn!("QuoteFeed: stream closed by server"),
                Err(e) => warn!(error = %e, "QuoteFeed: stream error"),
            }

            self.set_state(FeedState::Disconnected).await;
            info!(
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "QuoteFeed: reconnecting after delay"
            );
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn stream_once(&self) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        let (ws, _) = tokio_tungstenite::connect_async(self.config.url.as_str()).await?;
        let (mut write, mut read) = ws.split();

        self.set_state(FeedState::Connected).await;
        info!(symbols = ?self.config.symbols, "QuoteFeed: connected, subscribing");

        for symbol in &self.config.symbols {
            for path in [SUBSCRIBE_PATH, LAST_PRICES_PATH] {
                let request = StreamRequest {
                    p: path,
                    i: self.next_request_id(),
                    d: vec![symbol.clone()],
                };
                match serde_json::to_string(&request) {
                    Ok(json) => write.send(Message::Text(json)).await?,
                    Err(e) => error!(error = %e, symbol = %symbol, "QuoteFeed: failed to encode request"),
                }
            }
        }

        while let Some(message) = read.next().await {
            match message? {
                Message::Text(text) => {
                    self.apply_message(&text).await;
                }
                Message::Binary(bytes) => {
                    if let Ok(text) = std::str::from_utf8(&bytes) {
                        self.apply_message(text).await;
                    }
                }
                Message::Ping(payload) => write.send(Message::Pong(payload)).await?,
                Message::Close(frame) => {
                    debug!(frame = ?frame, "QuoteFeed: close frame received");
                    break;
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn set_state(&self, state: FeedState) {
        *self.state.write().await = state;
        if let Some(metrics) = &self.metrics {
            metrics
                .quote_feed_connected
                .set(if state == FeedState::Connected { 1.0 } else { 0.0 });
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Mark the feed disconnected after its task has been aborted
    pub async fn mark_stopped(&self) {
        self.set_state(FeedState::Disconnected).await;
    }
}

#[async_trait]
impl QuoteSource for QuoteFeed {
    async fn get_quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.read().await.get(symbol).cloned()
    }
}
