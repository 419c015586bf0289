//! Integration tests for reconciliation sweeps and the scheduler

use crate::test_utils::{ledger, order, test_config, MockBroker};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wingbot::config::AppConfig;
use wingbot::core::reconcile::{ReconcileConfig, Reconciler, SyncError};
use wingbot::core::scheduler::ReconciliationScheduler;
use wingbot::db::OrderLedger;
use wingbot::error::BrokerError;
use wingbot::models::Side;

fn fast_settings() -> ReconcileConfig {
    ReconcileConfig {
        interval: Duration::from_secs(3600),
        account_pause: Duration::from_millis(1),
        fetch_timeout: Duration::from_millis(50),
        max_attempts: 2,
        retry_delay: Duration::from_millis(10),
        fetch_gap: Duration::from_millis(1),
    }
}

fn reconciler(broker: Arc<MockBroker>, ledger: OrderLedger, config: AppConfig) -> Reconciler {
    Reconciler::new(broker, ledger, Arc::new(config), fast_settings())
}

#[tokio::test]
async fn sync_merges_broker_state_into_placed_orders() {
    let ledger = ledger().await;
    let mut placed = order("9000", "100", Side::Buy);
    placed.alert_id = Some("A1".to_string());
    placed.open_price = Some(1.1002);
    placed.bid_at_open = Some(1.1000);
    ledger.upsert_order(&placed).await.unwrap();

    let broker = MockBroker::new();
    let mut closed = order("9000", "100", Side::Buy);
    closed.close_price = Some(1.1017);
    closed.profit = Some(1.5);
    closed.open_time = Some(1_700_000_000_000);
    closed.close_time = Some(1_700_000_000_000 + 20 * 60_000);
    broker.set_closed("100", vec![closed]);
    broker.set_active("100", vec![order("9001", "100", Side::Sell)]);

    let sync = reconciler(broker, ledger.clone(), test_config())
        .sync_account("100")
        .await
        .unwrap();
    assert_eq!(sync.active_orders, 1);
    assert_eq!(sync.closed_orders, 1);
    assert_eq!(sync.total(), 2);

    let merged = ledger.get_order("9000").await.unwrap().unwrap();
    assert_eq!(merged.alert_id.as_deref(), Some("A1"));
    assert_eq!(merged.bid_at_open, Some(1.1000));
    assert_eq!(merged.open_price, Some(1.1002));
    assert_eq!(merged.close_price, Some(1.1017));
    assert_eq!(merged.duration_minutes, Some(20));
    assert!(ledger.get_order("9001").await.unwrap().is_some());
}

#[tokio::test]
async fn hanging_account_does_not_block_the_sweep() {
    let broker = MockBroker::new();
    broker.hang("100");
    broker.set_active("200", vec![order("8001", "200", Side::Buy)]);
    let ledger = ledger().await;

    let started = Instant::now();
    let report = reconciler(broker.clone(), ledger.clone(), test_config())
        .sweep()
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "100");
    assert!(report.failed[0].1.contains("timed out"));
    assert_eq!(report.synced.len(), 1);
    assert_eq!(report.synced[0].login, "200");
    assert_eq!(report.orders_synced(), 1);
    // Two attempts for the hanging account, one for the healthy one.
    assert_eq!(broker.active_calls(), 3);
    assert!(ledger.get_order("8001").await.unwrap().is_some());
}

#[tokio::test]
async fn timeout_surfaces_as_broker_error() {
    let broker = MockBroker::new();
    broker.hang("100");
    let err = reconciler(broker, ledger().await, test_config())
        .sync_account("100")
        .await
        .unwrap_err();
    match err {
        SyncError::Broker { kind, source } => {
            assert_eq!(kind, "active");
            assert!(matches!(source, BrokerError::Timeout));
        }
        other => panic!("expected broker error, got {:?}", other),
    }
}

#[tokio::test]
async fn secondary_account_without_credentials_is_skipped() {
    let config = AppConfig {
        secondary_account: Some("300".to_string()),
        ..test_config()
    };
    let reconciler = reconciler(MockBroker::new(), ledger().await, config);

    assert_eq!(reconciler.accounts(), vec!["100", "200", "300"]);

    let report = reconciler.sweep().await;
    assert_eq!(report.skipped, vec!["300".to_string()]);
    assert_eq!(report.synced.len(), 2);
    assert!(report.failed.is_empty());

    let err = reconciler.sync_account("300").await.unwrap_err();
    assert!(matches!(err, SyncError::MissingCredentials(login) if login == "300"));
}

#[tokio::test]
async fn scheduler_runs_an_initial_sweep() {
    let broker = MockBroker::new();
    broker.set_active("100", vec![order("7001", "100", Side::Buy)]);
    let ledger = ledger().await;
    let reconciler = Arc::new(reconciler(broker, ledger.clone(), test_config()));

    let scheduler = ReconciliationScheduler::new(reconciler, 3600).unwrap();
    scheduler.start().await;
    scheduler.start().await;
    assert!(scheduler.is_running().await);

    let mut synced = false;
    for _ in 0..200 {
        if ledger.get_order("7001").await.unwrap().is_some() {
            synced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(synced);

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
}

#[tokio::test]
async fn zero_interval_disables_the_scheduler() {
    let reconciler = Arc::new(reconciler(MockBroker::new(), ledger().await, test_config()));
    assert!(ReconciliationScheduler::new(reconciler, 0).is_err());
}

fn conflict_settings() -> ReconcileConfig {
    ReconcileConfig {
        fetch_timeout: Duration::from_secs(5),
        max_attempts: 3,
        retry_delay: Duration::from_millis(100),
        ..fast_settings()
    }
}

/// Time spent syncing account 100 while its first two active fetches fail with `error`
async fn sync_time_after_two_failures(error: fn() -> BrokerError) -> Duration {
    // The ledger is built on real time; the scripted sync never touches it.
    let ledger = ledger().await;
    let broker = MockBroker::new();
    broker.fail_active("100", vec![error(), error()]);
    let reconciler = Reconciler::new(
        broker.clone(),
        ledger,
        Arc::new(test_config()),
        conflict_settings(),
    );

    tokio::time::pause();
    let started = tokio::time::Instant::now();
    let sync = reconciler.sync_account("100").await.unwrap();
    let elapsed = started.elapsed();
    tokio::time::resume();

    assert_eq!(sync.total(), 0);
    assert_eq!(broker.active_calls(), 3);
    elapsed
}

#[tokio::test]
async fn conflicts_double_the_retry_delay() {
    let elapsed = sync_time_after_two_failures(|| BrokerError::Http {
        status: 409,
        message: "conflict".to_string(),
    })
    .await;
    // two retries at 2 x 100ms plus the 1ms fetch gap
    assert!(elapsed >= Duration::from_millis(401), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(450), "{:?}", elapsed);
}

#[tokio::test]
async fn auth_conflicts_also_double_the_retry_delay() {
    let elapsed =
        sync_time_after_two_failures(|| BrokerError::AuthConflict("token in use".to_string()))
            .await;
    assert!(elapsed >= Duration::from_millis(401), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(450), "{:?}", elapsed);
}

#[tokio::test]
async fn other_retryable_errors_keep_the_constant_delay() {
    let elapsed = sync_time_after_two_failures(|| BrokerError::Http {
        status: 503,
        message: "unavailable".to_string(),
    })
    .await;
    assert!(elapsed >= Duration::from_millis(201), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(250), "{:?}", elapsed);
}
