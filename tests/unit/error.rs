//! Unit tests for error classification

use wingbot::error::{BrokerError, LedgerError, ProcessError, RejectReason};
use wingbot::models::{OutcomeStatus, TradingMode};

fn http(status: u16) -> BrokerError {
    BrokerError::Http {
        status,
        message: String::new(),
    }
}

#[test]
fn broker_errors_classify_retryability() {
    assert!(BrokerError::Timeout.is_retryable());
    assert!(BrokerError::Connection("reset".into()).is_retryable());
    assert!(BrokerError::AuthConflict("busy".into()).is_retryable());
    assert!(http(503).is_retryable());
    assert!(http(429).is_retryable());
    assert!(!http(400).is_retryable());
    assert!(!BrokerError::InvalidCredentials("bad".into()).is_retryable());
    assert!(!BrokerError::Unauthorized.is_retryable());
}

#[test]
fn conflict_detection_covers_auth_and_http_409() {
    assert!(BrokerError::AuthConflict("x".into()).is_conflict());
    assert!(http(409).is_conflict());
    assert!(!BrokerError::Timeout.is_conflict());
}

#[test]
fn broker_errors_map_onto_process_taxonomy() {
    assert!(matches!(
        ProcessError::from(BrokerError::AuthConflict("x".into())),
        ProcessError::AuthConflict(_)
    ));
    assert!(matches!(
        ProcessError::from(BrokerError::Unauthorized),
        ProcessError::AuthExpired(_)
    ));
    assert!(matches!(
        ProcessError::from(BrokerError::Timeout),
        ProcessError::Transient(_)
    ));
    assert!(matches!(
        ProcessError::from(BrokerError::EmptyResponse),
        ProcessError::Unknown(_)
    ));
}

#[test]
fn only_transient_failures_are_retried() {
    let rejected = ProcessError::from(RejectReason::ModeMismatch {
        account: "1".into(),
        mode: TradingMode::SellOnly,
    });
    assert!(!rejected.is_retryable());
    assert_eq!(rejected.outcome_status(), OutcomeStatus::Rejected);

    let transient = ProcessError::from(BrokerError::Timeout);
    assert!(transient.is_retryable());
    assert_eq!(transient.outcome_status(), OutcomeStatus::Error);

    let persistence = ProcessError::from(LedgerError::InvalidValue {
        column: "side",
        value: "X".into(),
    });
    assert!(persistence.is_retryable());

    assert!(!ProcessError::from(BrokerError::Unauthorized).is_retryable());
}

#[test]
fn reject_messages_are_human_readable() {
    let mode = RejectReason::ModeMismatch {
        account: "3979960".into(),
        mode: TradingMode::SellOnly,
    };
    assert_eq!(mode.to_string(), "Account 3979960 is in SELL_ONLY mode");

    let exposure = RejectReason::MaxExposure {
        opened: 0.02,
        attempted: 0.01,
        max: 0.02,
    };
    assert_eq!(
        exposure.to_string(),
        "Max limit reached. Opened: 0.02, Attempted: 0.01, Max: 0.02"
    );
}
