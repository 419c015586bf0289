//! Integration tests for the SQLite order ledger

use crate::test_utils::{ledger, order};
use serde_json::json;
use tokio_test::assert_ok;
use wingbot::models::{
    AccountSettings, CredentialSlot, Order, OutcomeStatus, ProcessedAlertKey, Reality, Side,
    TradingAccount, TradingMode, WebhookOutcome,
};
use wingbot::services::simplefx::client::to_order;
use wingbot::services::simplefx::messages::BrokerOrder;

fn approx(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-6)
}

#[tokio::test]
async fn upsert_inserts_and_reads_back() {
    let ledger = ledger().await;
    let mut placed = order("5001", "100", Side::Buy);
    placed.open_price = Some(1.1002);
    placed.alert_id = Some("A1".to_string());
    placed.tags.ft = Some("trend".to_string());

    ledger.upsert_order(&placed).await.unwrap();

    let stored = ledger.get_order("5001").await.unwrap().unwrap();
    assert_eq!(stored.login, "100");
    assert_eq!(stored.side, Some(Side::Buy));
    assert_eq!(stored.alert_id.as_deref(), Some("A1"));
    assert_eq!(stored.tags.ft.as_deref(), Some("trend"));
    assert!(ledger.order_exists("A1", "100").await.unwrap());
    assert!(!ledger.order_exists("A1", "200").await.unwrap());
}

#[tokio::test]
async fn null_fields_never_overwrite_stored_values() {
    let ledger = ledger().await;

    let mut placed = order("5002", "100", Side::Buy);
    placed.open_price = Some(1.1002);
    placed.take_profit = Some(1.1017);
    placed.alert_id = Some("A2".to_string());
    placed.bid_at_open = Some(1.1000);
    placed.ask_at_open = Some(1.1002);
    ledger.upsert_order(&placed).await.unwrap();

    // Broker view from reconciliation: knows the close, not the alert context.
    let mut synced = order("5002", "100", Side::Buy);
    synced.close_price = Some(1.1017);
    synced.profit = Some(1.5);
    ledger.upsert_order(&synced).await.unwrap();

    let stored = ledger.get_order("5002").await.unwrap().unwrap();
    assert!(approx(stored.open_price, 1.1002));
    assert!(approx(stored.take_profit, 1.1017));
    assert!(approx(stored.close_price, 1.1017));
    assert!(approx(stored.profit, 1.5));
    assert_eq!(stored.alert_id.as_deref(), Some("A2"));
    assert!(approx(stored.bid_at_open, 1.1000));
    assert!(approx(stored.ask_at_open, 1.1002));
}

#[tokio::test]
async fn sparse_broker_row_keeps_symbol_side_and_volume() {
    let ledger = ledger().await;
    let mut placed = Order::new("9000", "100", "EURUSD", Side::Sell, 0.05, Reality::Demo);
    placed.open_price = Some(1.1);
    placed.take_profit = Some(1.0985);
    ledger.upsert_order(&placed).await.unwrap();

    let account = TradingAccount::new("100", Reality::Demo, CredentialSlot::Primary);
    let wire: BrokerOrder =
        serde_json::from_value(json!({ "id": 9000, "closePrice": 1.09 })).unwrap();
    let close_event = to_order(wire, &account);
    assert_eq!(close_event.symbol, None);
    assert_eq!(close_event.side, None);
    assert_eq!(close_event.volume, None);
    ledger.upsert_order(&close_event).await.unwrap();

    let stored = ledger.get_order("9000").await.unwrap().unwrap();
    assert_eq!(stored.symbol.as_deref(), Some("EURUSD"));
    assert_eq!(stored.side, Some(Side::Sell));
    assert!(approx(stored.volume, 0.05));
    assert!(approx(stored.open_price, 1.1));
    assert!(approx(stored.close_price, 1.09));
    assert!(approx(stored.real_tp_pips, 15.0));
}

#[tokio::test]
async fn sparse_row_is_completed_by_a_later_full_row() {
    let ledger = ledger().await;
    let mut first = Order::partial("9100", "100", Reality::Demo);
    first.open_price = Some(1.1);
    first.take_profit = Some(1.1015);
    ledger.upsert_order(&first).await.unwrap();

    let stored = ledger.get_order("9100").await.unwrap().unwrap();
    assert_eq!(stored.symbol, None);
    assert_eq!(stored.real_tp_pips, None);

    ledger
        .upsert_order(&order("9100", "100", Side::Buy))
        .await
        .unwrap();

    let stored = ledger.get_order("9100").await.unwrap().unwrap();
    assert_eq!(stored.symbol.as_deref(), Some("EURUSD"));
    assert_eq!(stored.side, Some(Side::Buy));
    assert!(approx(stored.real_tp_pips, 15.0));
}

#[tokio::test]
async fn repeated_upsert_is_idempotent() {
    let ledger = ledger().await;
    let mut placed = order("5003", "100", Side::Sell);
    placed.open_price = Some(1.2);
    placed.open_time = Some(1_700_000_000_000);

    for _ in 0..3 {
        ledger.upsert_order(&placed).await.unwrap();
    }

    let orders = ledger.get_orders_for_account("100").await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, "5003");
}

#[tokio::test]
async fn derived_columns_follow_the_merged_row() {
    let ledger = ledger().await;
    let open_time = 1_700_000_000_000;

    let mut placed = order("5004", "100", Side::Buy);
    placed.open_price = Some(1.1002);
    placed.take_profit = Some(1.1017);
    placed.stop_loss = Some(1.0992);
    placed.reference_price = Some(1.0990);
    placed.open_time = Some(open_time);
    ledger.upsert_order(&placed).await.unwrap();

    let stored = ledger.get_order("5004").await.unwrap().unwrap();
    assert!(approx(stored.real_tp_pips, 15.0));
    assert!(approx(stored.real_sl_pips, 10.0));
    assert!(approx(stored.reference_deviation_pips, 12.0));
    assert_eq!(stored.duration_minutes, None);

    let mut closed = order("5004", "100", Side::Buy);
    closed.close_time = Some(open_time + 45 * 60_000);
    ledger.upsert_order(&closed).await.unwrap();

    let stored = ledger.get_order("5004").await.unwrap().unwrap();
    assert_eq!(stored.duration_minutes, Some(45));
    assert!(approx(stored.real_tp_pips, 15.0));
}

#[tokio::test]
async fn symbol_orders_are_oldest_first() {
    let ledger = ledger().await;
    for (id, time) in [("b", 2_000), ("a", 1_000), ("c", 3_000)] {
        let mut o = order(id, "100", Side::Buy);
        o.open_time = Some(time);
        ledger.upsert_order(&o).await.unwrap();
    }

    let ids: Vec<String> = ledger
        .get_orders_for_symbol("100", "EURUSD")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order_id)
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let recent = ledger.get_recent_orders("100", 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].order_id, "c");
}

#[tokio::test]
async fn max_size_is_stamped_on_every_account_order() {
    let ledger = ledger().await;
    ledger.upsert_order(&order("m1", "100", Side::Buy)).await.unwrap();
    ledger.upsert_order(&order("m2", "100", Side::Sell)).await.unwrap();
    ledger.upsert_order(&order("m3", "200", Side::Buy)).await.unwrap();

    assert_eq!(ledger.update_max_size("100", 0.05).await.unwrap(), 2);

    let stored = ledger.get_order("m2").await.unwrap().unwrap();
    assert!(approx(stored.max_size, 0.05));
    let other = ledger.get_order("m3").await.unwrap().unwrap();
    assert_eq!(other.max_size, None);
}

#[tokio::test]
async fn settings_default_until_saved() {
    let ledger = ledger().await;
    assert_eq!(
        ledger.get_account_settings("100").await.unwrap(),
        AccountSettings::default()
    );

    let custom = AccountSettings {
        trading_mode: TradingMode::SellOnly,
        asia_session: false,
        exclusive_mode: true,
        ..AccountSettings::default()
    };
    ledger.save_account_settings("100", &custom).await.unwrap();
    assert_eq!(ledger.get_account_settings("100").await.unwrap(), custom);

    let relaxed = AccountSettings::default();
    ledger.save_account_settings("100", &relaxed).await.unwrap();
    assert_eq!(ledger.get_account_settings("100").await.unwrap(), relaxed);
}

#[tokio::test]
async fn outcomes_are_listed_newest_first() {
    let ledger = ledger().await;
    for (timestamp, status, account) in [
        (1_000, OutcomeStatus::Received, "100"),
        (2_000, OutcomeStatus::Placed, "100"),
        (3_000, OutcomeStatus::Rejected, "200"),
    ] {
        ledger
            .record_webhook_outcome(&WebhookOutcome {
                account: account.to_string(),
                alert_id: Some("A1".to_string()),
                status,
                message: format!("{} at {}", status, timestamp),
                symbol: Some("EURUSD".to_string()),
                action: Some("BUY".to_string()),
                size: Some(0.01),
                order_id: None,
                timestamp,
            })
            .await
            .unwrap();
    }

    let account = ledger.get_webhook_outcomes("100", 10).await.unwrap();
    let statuses: Vec<OutcomeStatus> = account.iter().map(|o| o.status).collect();
    assert_eq!(statuses, vec![OutcomeStatus::Placed, OutcomeStatus::Received]);

    let all = ledger.get_recent_log_entries(2).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].status, OutcomeStatus::Rejected);
    assert_eq!(all[0].account, "200");
}

#[tokio::test]
async fn processed_keys_survive_reload() {
    let ledger = ledger().await;
    let key = ProcessedAlertKey::new("A1", "100");

    ledger.mark_processed(&key).await.unwrap();
    ledger.mark_processed(&key).await.unwrap();
    ledger
        .mark_processed(&ProcessedAlertKey::new("A1", "200"))
        .await
        .unwrap();

    let keys = ledger.load_processed_keys().await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&key));
}

#[tokio::test]
async fn file_database_is_created_on_connect() {
    let dir = std::env::temp_dir().join(format!("wingbot-ledger-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let url = format!("sqlite://{}", dir.join("orders.db").display());

    let ledger = wingbot::db::OrderLedger::connect(&url, 2).await.unwrap();
    assert_ok!(ledger.ping().await);
    ledger.upsert_order(&order("f1", "100", Side::Buy)).await.unwrap();
    assert!(ledger.get_order("f1").await.unwrap().is_some());

    let _ = std::fs::remove_dir_all(&dir);
}
