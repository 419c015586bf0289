//! One-shot reconciliation
//!
//! Usage: `sync [ACCOUNT]`. Without an account every monitored account is
//! synced; the process exits non-zero when any account failed.

use std::process::ExitCode;
use tracing::{error, info};
use wingbot::config::AppConfig;
use wingbot::core::runtime::{Runtime, RuntimeConfig};
use wingbot::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    if let Err(e) = init_logging("sync") {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match Runtime::build(config, RuntimeConfig::default()).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to initialise");
            return ExitCode::FAILURE;
        }
    };

    let code = match std::env::args().nth(1) {
        Some(login) => match runtime.reconciler.sync_account(&login).await {
            Ok(sync) => {
                info!(
                    account = %sync.login,
                    active = sync.active_orders,
                    closed = sync.closed_orders,
                    "Sync complete"
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(account = %login, error = %e, "Sync failed");
                ExitCode::FAILURE
            }
        },
        None => {
            let report = runtime.reconciler.sweep().await;
            if report.failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    };

    runtime.shutdown().await;
    code
}
