//! Error types for the pipeline

use crate::models::account::{CredentialSlot, TradingMode, TradingSession};
use crate::models::order::Side;
use crate::models::outcome::OutcomeStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid URL ({value}): {source}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Alert payload could not be turned into an [`Alert`](crate::models::Alert)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlertError {
    #[error("alert id ('id') is required")]
    MissingAlertId,
    #[error("invalid action '{0}', expected B or S")]
    InvalidAction(String),
    #[error("invalid symbol '{0}'")]
    InvalidSymbol(String),
    #[error("invalid number for '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Errors from the brokerage REST API
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("failed to parse broker response: {0}")]
    Parse(String),

    /// The broker refused a concurrent authentication attempt
    #[error("authentication conflict: {0}")]
    AuthConflict(String),

    #[error("invalid API credentials: {0}")]
    InvalidCredentials(String),

    /// A request was still rejected with 401 after a fresh token
    #[error("request unauthorized after token refresh")]
    Unauthorized,

    #[error("no API credentials configured for the {0:?} slot")]
    MissingCredentials(CredentialSlot),

    #[error("broker returned no order for the placement")]
    EmptyResponse,

    #[error("volume {volume} is below the minimum {minimum} for {symbol}")]
    VolumeBelowMinimum {
        symbol: String,
        volume: f64,
        minimum: f64,
    },
}

impl BrokerError {
    /// Whether retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BrokerError::Timeout | BrokerError::Connection(_) | BrokerError::AuthConflict(_) => {
                true
            }
            BrokerError::Http { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429 || *status == 409
            }
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BrokerError::AuthConflict(_) | BrokerError::Http { status: 409, .. }
        )
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrokerError::Timeout
        } else if err.is_connect() {
            BrokerError::Connection(err.to_string())
        } else if err.is_decode() {
            BrokerError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            BrokerError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            BrokerError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Parse(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid value stored in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },
}

/// Why the risk gate refused an alert
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("Unsupported symbol: {symbol}. Supported: {supported}")]
    UnsupportedSymbol { symbol: String, supported: String },

    #[error("Invalid take profit: {0}")]
    InvalidTakeProfit(f64),

    #[error("Invalid stop loss: {0}")]
    InvalidStopLoss(f64),

    #[error("Take profit too small. Minimum: {minimum} {unit}")]
    TakeProfitTooSmall { minimum: f64, unit: &'static str },

    #[error("Stop loss too small. Minimum: {minimum} {unit}")]
    StopLossTooSmall { minimum: f64, unit: &'static str },

    #[error("Account {account} in Exclusive Mode and already has open trade")]
    ExclusiveMode { account: String },

    #[error("Session {session} is disabled for account {account}")]
    SessionDisabled {
        session: TradingSession,
        account: String,
    },

    #[error("Account {account} is in {mode} mode")]
    ModeMismatch { account: String, mode: TradingMode },

    #[error("Alert ID {alert_id} already processed")]
    AlreadyProcessed { alert_id: String },

    #[error("Max limit reached. Opened: {opened}, Attempted: {attempted}, Max: {max}")]
    MaxExposure {
        opened: f64,
        attempted: f64,
        max: f64,
    },

    #[error("Already have {count} {side} order(s) open")]
    SideAlreadyOpen { count: usize, side: Side },

    #[error("No current market price available for {symbol}")]
    NoQuote { symbol: String },
}

/// Failure of a single webhook job
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{0}")]
    Rejected(#[from] RejectReason),

    #[error("broker unavailable: {0}")]
    Transient(BrokerError),

    #[error("broker authentication conflict: {0}")]
    AuthConflict(BrokerError),

    #[error("broker authorization expired: {0}")]
    AuthExpired(BrokerError),

    #[error("ledger failure: {0}")]
    Persistence(#[from] LedgerError),

    #[error("{0}")]
    Unknown(String),
}

impl ProcessError {
    /// Whether the queue should run the job again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProcessError::Transient(_) | ProcessError::AuthConflict(_) | ProcessError::Persistence(_)
        )
    }

    pub fn outcome_status(&self) -> OutcomeStatus {
        match self {
            ProcessError::Rejected(_) => OutcomeStatus::Rejected,
            _ => OutcomeStatus::Error,
        }
    }
}

impl From<BrokerError> for ProcessError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::AuthConflict(_) => ProcessError::AuthConflict(err),
            BrokerError::Unauthorized => ProcessError::AuthExpired(err),
            e if e.is_retryable() => ProcessError::Transient(e),
            e => ProcessError::Unknown(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler disabled: interval is 0")]
    Disabled,

    #[error("invalid cron expression '{expression}': {message}")]
    InvalidSchedule { expression: String, message: String },
}
