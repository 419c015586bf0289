//! Service wrapper owning the quote feed's connection task

use crate::services::simplefx::QuoteFeed;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{info, warn};

/// Keeps the quote feed connected for the lifetime of the process.
///
/// Stopping the service aborts the reconnect loop as a unit.
pub struct QuoteFeedService {
    feed: Arc<QuoteFeed>,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

impl QuoteFeedService {
    pub fn new(feed: Arc<QuoteFeed>) -> Self {
        Self {
            feed,
            handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Start the connection loop; calling it twice is a no-op
    pub async fn start(&self) {
        let mut handle = self.handle.write().await;
        if handle.is_some() {
            return;
        }

        let feed = self.feed.clone();
        *handle = Some(tokio::spawn(feed.run()));
        info!(symbols = ?self.feed.symbols(), "QuoteFeedService: started");
    }

    /// Wait briefly for the first connection, logging the result
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let connected = self.feed.wait_for_connection(timeout).await;
        if connected {
            info!("QuoteFeedService: connection established");
        } else {
            warn!("QuoteFeedService: connection timeout, reconnect loop will keep trying");
        }
        connected
    }

    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(h) = handle.take() {
            h.abort();
            self.feed.mark_stopped().await;
            info!("QuoteFeedService: stopped");
        }
    }

    pub fn feed(&self) -> Arc<QuoteFeed> {
        self.feed.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
