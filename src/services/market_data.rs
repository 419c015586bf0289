//! Quote source interface used by the risk gate

use crate::models::Quote;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Latest snapshot for the symbol, or `None` if none has been received
    async fn get_quote(&self, symbol: &str) -> Option<Quote>;
}

/// Quote source backed by a map that callers fill in directly.
///
/// Used where no live stream is running, e.g. one-shot tools and tests.
#[derive(Default)]
pub struct StaticQuotes {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, quote: Quote) {
        self.quotes.write().await.insert(quote.symbol.clone(), quote);
    }

    pub async fn remove(&self, symbol: &str) {
        self.quotes.write().await.remove(symbol);
    }
}

#[async_trait]
impl QuoteSource for StaticQuotes {
    async fn get_quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.read().await.get(symbol).cloned()
    }
}
