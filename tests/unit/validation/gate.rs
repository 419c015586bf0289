//! Unit tests for the risk gate check order

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use wingbot::error::RejectReason;
use wingbot::models::{
    AccountSettings, Alert, Exposure, InstrumentSpec, Side, TradingMode, TradingSession,
};
use wingbot::validation::{GateInput, RiskGate, Verdict};

fn gate() -> RiskGate {
    RiskGate::new(vec![
        "EURUSD".to_string(),
        "USDJPY".to_string(),
        "US100".to_string(),
    ])
}

fn london() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

fn alert(overrides: Value) -> Alert {
    let mut payload = json!({
        "id": "A1",
        "a": "B",
        "sy": "EURUSD",
        "z": 0.01,
        "m": 0.02,
        "t": 15,
        "s": 8,
        "l": "3979960"
    });
    if let (Some(base), Some(extra)) = (payload.as_object_mut(), overrides.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    Alert::from_payload(&payload, "3979960", london()).unwrap()
}

fn evaluate(
    alert: &Alert,
    settings: &AccountSettings,
    already_processed: bool,
    exposure: Option<&Exposure>,
) -> Verdict {
    let instrument = InstrumentSpec::lookup(&alert.symbol);
    gate().evaluate(&GateInput {
        alert,
        instrument: &instrument,
        settings,
        already_processed,
        exposure,
        now: london(),
    })
}

fn rejected(verdict: Verdict) -> RejectReason {
    match verdict {
        Verdict::Rejected(reason) => reason,
        other => panic!("expected rejection, got {:?}", other),
    }
}

fn flat() -> Exposure {
    Exposure::default()
}

#[test]
fn approves_clean_alert() {
    let verdict = evaluate(&alert(json!({})), &AccountSettings::default(), false, Some(&flat()));
    assert_eq!(verdict, Verdict::Approved);
}

#[test]
fn asks_for_exposure_only_when_needed() {
    let verdict = evaluate(&alert(json!({})), &AccountSettings::default(), false, None);
    assert_eq!(verdict, Verdict::NeedsExposure);
}

#[test]
fn unsupported_symbol_is_checked_first() {
    let reason = rejected(evaluate(
        &alert(json!({ "sy": "BTCUSD", "t": 0 })),
        &AccountSettings::default(),
        true,
        None,
    ));
    assert!(matches!(reason, RejectReason::UnsupportedSymbol { ref symbol, .. } if symbol == "BTCUSD"));
}

#[test]
fn distance_checks() {
    let settings = AccountSettings::default();

    let reason = rejected(evaluate(&alert(json!({ "t": 0 })), &settings, false, None));
    assert_eq!(reason, RejectReason::InvalidTakeProfit(0.0));

    let reason = rejected(evaluate(&alert(json!({ "s": -3 })), &settings, false, None));
    assert_eq!(reason, RejectReason::InvalidStopLoss(-3.0));

    let reason = rejected(evaluate(&alert(json!({ "t": 3 })), &settings, false, None));
    assert_eq!(
        reason,
        RejectReason::TakeProfitTooSmall {
            minimum: 5.0,
            unit: "pips"
        }
    );

    let reason = rejected(evaluate(
        &alert(json!({ "sy": "US100", "t": 20, "s": 4 })),
        &settings,
        false,
        None,
    ));
    assert_eq!(
        reason,
        RejectReason::StopLossTooSmall {
            minimum: 10.0,
            unit: "points"
        }
    );

    let reason = rejected(evaluate(
        &alert(json!({ "sy": "USDJPY", "t": 8 })),
        &settings,
        false,
        None,
    ));
    assert!(matches!(reason, RejectReason::TakeProfitTooSmall { minimum, .. } if minimum == 10.0));
}

#[test]
fn exclusive_mode_precedes_session_check() {
    let settings = AccountSettings {
        exclusive_mode: true,
        london_session: false,
        ..AccountSettings::default()
    };
    let alert = alert(json!({}));

    assert_eq!(evaluate(&alert, &settings, false, None), Verdict::NeedsExposure);

    let open = Exposure {
        open_volume: 0.01,
        buy_count: 0,
        sell_count: 1,
        ..Exposure::default()
    };
    let reason = rejected(evaluate(&alert, &settings, false, Some(&open)));
    assert_eq!(
        reason.to_string(),
        "Account 3979960 in Exclusive Mode and already has open trade"
    );

    let reason = rejected(evaluate(&alert, &settings, false, Some(&flat())));
    assert_eq!(
        reason,
        RejectReason::SessionDisabled {
            session: TradingSession::London,
            account: "3979960".to_string()
        }
    );
}

#[test]
fn mode_mismatch_precedes_idempotency() {
    let settings = AccountSettings {
        trading_mode: TradingMode::SellOnly,
        ..AccountSettings::default()
    };
    let reason = rejected(evaluate(&alert(json!({})), &settings, true, None));
    assert_eq!(
        reason,
        RejectReason::ModeMismatch {
            account: "3979960".to_string(),
            mode: TradingMode::SellOnly
        }
    );
}

#[test]
fn already_processed_rejects_without_exposure() {
    let reason = rejected(evaluate(
        &alert(json!({})),
        &AccountSettings::default(),
        true,
        None,
    ));
    assert_eq!(reason.to_string(), "Alert ID A1 already processed");
}

#[test]
fn max_exposure_is_inclusive() {
    let settings = AccountSettings::default();
    let open_sell = Exposure {
        open_volume: 0.01,
        buy_count: 0,
        sell_count: 1,
        ..Exposure::default()
    };

    // 0.01 open + 0.01 requested reaches exactly the 0.02 limit.
    assert_eq!(
        evaluate(&alert(json!({})), &settings, false, Some(&open_sell)),
        Verdict::Approved
    );

    let reason = rejected(evaluate(
        &alert(json!({ "m": 0.01 })),
        &settings,
        false,
        Some(&open_sell),
    ));
    assert!(matches!(reason, RejectReason::MaxExposure { .. }));
}

#[test]
fn same_side_position_blocks_new_order() {
    let open_buy = Exposure {
        open_volume: 0.01,
        buy_count: 1,
        sell_count: 0,
        ..Exposure::default()
    };
    let reason = rejected(evaluate(
        &alert(json!({ "m": 1.0 })),
        &AccountSettings::default(),
        false,
        Some(&open_buy),
    ));
    assert_eq!(
        reason,
        RejectReason::SideAlreadyOpen {
            count: 1,
            side: Side::Buy
        }
    );

    let sell = alert(json!({ "a": "S", "m": 1.0 }));
    assert_eq!(
        evaluate(&sell, &AccountSettings::default(), false, Some(&open_buy)),
        Verdict::Approved
    );
}
