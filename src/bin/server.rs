//! Wingbot server
//!
//! Serves the webhook and read-only API, keeps the quote feed connected,
//! drains the webhook queue and runs scheduled reconciliation.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info, warn};
use wingbot::config::AppConfig;
use wingbot::core::http::start_server;
use wingbot::core::runtime::{Runtime, RuntimeConfig};
use wingbot::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging("server")?;

    let config = AppConfig::from_env()?;
    info!(
        environment = %config.environment,
        port = config.port,
        accounts = ?config.monitored_accounts,
        symbols = ?config.supported_symbols,
        "Starting Wingbot server"
    );

    let port = config.port;
    let runtime = Runtime::build(config, RuntimeConfig::default()).await?;
    runtime.start_feed(Duration::from_secs(10)).await;

    let scheduler = match runtime.scheduler() {
        Ok(scheduler) => {
            scheduler.start().await;
            Some(scheduler)
        }
        Err(e) => {
            warn!(error = %e, "Reconciliation scheduler not started");
            None
        }
    };

    let stop = Arc::new(Notify::new());
    let server_stop = stop.clone();
    let state = runtime.app_state();
    let mut server_handle = tokio::spawn(async move {
        let shutdown = async move { server_stop.notified().await };
        if let Err(e) = start_server(state, port, shutdown).await {
            error!(error = %e, "HTTP server error");
        }
    });

    let server_running = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            true
        }
        _ = &mut server_handle => {
            error!("HTTP server stopped unexpectedly");
            false
        }
    };

    stop.notify_one();
    if let Some(scheduler) = &scheduler {
        scheduler.stop().await;
    }
    runtime.shutdown().await;
    if server_running
        && tokio::time::timeout(Duration::from_secs(5), server_handle)
            .await
            .is_err()
    {
        warn!("HTTP server did not stop within 5s");
    }

    info!("Wingbot server stopped");
    Ok(())
}
