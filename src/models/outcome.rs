use crate::models::alert::Alert;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status recorded for every alert the pipeline sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Received,
    Placed,
    Rejected,
    Error,
    Duplicate,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Received => "RECEIVED",
            OutcomeStatus::Placed => "PLACED",
            OutcomeStatus::Rejected => "REJECTED",
            OutcomeStatus::Error => "ERROR",
            OutcomeStatus::Duplicate => "DUPLICATE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RECEIVED" => Some(OutcomeStatus::Received),
            "PLACED" => Some(OutcomeStatus::Placed),
            "REJECTED" => Some(OutcomeStatus::Rejected),
            "ERROR" => Some(OutcomeStatus::Error),
            "DUPLICATE" => Some(OutcomeStatus::Duplicate),
            _ => None,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the webhook outcome log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookOutcome {
    pub account: String,
    pub alert_id: Option<String>,
    pub status: OutcomeStatus,
    pub message: String,
    pub symbol: Option<String>,
    pub action: Option<String>,
    pub size: Option<f64>,
    pub order_id: Option<String>,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl WebhookOutcome {
    pub fn for_alert(alert: &Alert, status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            account: alert.account.clone(),
            alert_id: Some(alert.alert_id.clone()),
            status,
            message: message.into(),
            symbol: Some(alert.symbol.clone()),
            action: Some(alert.side.as_str().to_string()),
            size: Some(alert.size),
            order_id: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
