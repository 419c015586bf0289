//! Outcome log: one tracing event and one ledger row per alert decision

use crate::db::OrderLedger;
use crate::error::ProcessError;
use crate::models::{Alert, Order, OutcomeStatus, WebhookOutcome};
use tracing::{error, info, warn};

#[derive(Clone, Default)]
pub struct OutcomeLog {
    ledger: Option<OrderLedger>,
}

impl OutcomeLog {
    pub fn new(ledger: Option<OrderLedger>) -> Self {
        Self { ledger }
    }

    pub async fn received(&self, alert: &Alert, job_id: &str) {
        let message = format!(
            "WEBHOOK: {} {} {} TP:{} SL:{} | Acc:{} | ID:{} | Job:{}",
            alert.symbol,
            alert.side,
            alert.size,
            alert.take_profit,
            display_opt(alert.stop_loss),
            alert.account,
            alert.alert_id,
            job_id
        );
        info!(account = %alert.account, alert_id = %alert.alert_id, job_id = %job_id, "{}", message);
        self.store(WebhookOutcome::for_alert(alert, OutcomeStatus::Received, message))
            .await;
    }

    pub async fn duplicate(&self, alert: &Alert) {
        let message = format!(
            "DUPLICATE: {} {} {} | Acc:{} | AlertID:{}",
            alert.symbol, alert.side, alert.size, alert.account, alert.alert_id
        );
        warn!(account = %alert.account, alert_id = %alert.alert_id, "{}", message);
        self.store(WebhookOutcome::for_alert(alert, OutcomeStatus::Duplicate, message))
            .await;
    }

    pub async fn placed(&self, alert: &Alert, order: &Order) {
        let message = format!(
            "ORDER PLACED: {} {} {} @ {} TP:{} SL:{} | Acc:{} | OrderID:{} | AlertID:{}",
            alert.symbol,
            alert.side,
            order.volume.unwrap_or(alert.size),
            display_opt(order.open_price),
            display_opt(order.take_profit),
            display_opt(order.stop_loss),
            alert.account,
            order.order_id,
            alert.alert_id
        );
        info!(
            account = %alert.account,
            alert_id = %alert.alert_id,
            order_id = %order.order_id,
            "{}",
            message
        );
        let mut outcome = WebhookOutcome::for_alert(alert, OutcomeStatus::Placed, message);
        outcome.order_id = Some(order.order_id.clone());
        self.store(outcome).await;
    }

    /// Record a job that ended without an order, as a rejection or an error
    pub async fn failed(&self, alert: &Alert, err: &ProcessError) {
        let status = err.outcome_status();
        let (heading, label) = match status {
            OutcomeStatus::Rejected => ("ORDER REJECTED", "Reason"),
            _ => ("ERROR", "Error"),
        };
        let message = format!(
            "{}: {} {} {} | Acc:{} | {}: {} | AlertID:{}",
            heading, alert.symbol, alert.side, alert.size, alert.account, label, err, alert.alert_id
        );
        if status == OutcomeStatus::Rejected {
            warn!(account = %alert.account, alert_id = %alert.alert_id, "{}", message);
        } else {
            error!(account = %alert.account, alert_id = %alert.alert_id, "{}", message);
        }
        self.store(WebhookOutcome::for_alert(alert, status, message))
            .await;
    }

    async fn store(&self, outcome: WebhookOutcome) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        if let Err(e) = ledger.record_webhook_outcome(&outcome).await {
            error!(
                error = %e,
                account = %outcome.account,
                status = %outcome.status,
                "OutcomeLog: failed to store webhook outcome"
            );
        }
    }
}

fn display_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
