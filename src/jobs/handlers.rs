//! Webhook job handler: risk gate, pricing, placement, ledger update

use crate::error::ProcessError;
use crate::jobs::context::JobContext;
use crate::jobs::queue::JobProcessor;
use crate::jobs::types::WebhookJob;
use crate::models::{
    AccountSettings, Alert, Exposure, InstrumentSpec, Order, OutcomeStatus, TradingAccount,
};
use crate::services::broker::Page;
use crate::validation::{plan_order, GateInput, OrderPlan, Verdict};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct WebhookProcessor {
    ctx: Arc<JobContext>,
}

impl WebhookProcessor {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<JobContext> {
        &self.ctx
    }

    /// Everything from settings lookup to the ledger write runs under the account lock
    async fn execute(&self, job: &WebhookJob) -> Result<Order, ProcessError> {
        let alert = &job.alert;
        let instrument = InstrumentSpec::lookup(&alert.symbol);
        let account = self.ctx.config.trading_account(&alert.account);

        let _guard = self.ctx.locks.acquire(&alert.account).await;
        debug!(job_id = %job.id, account = %alert.account, "WebhookProcessor: account lock acquired");

        let settings = match self.ctx.ledger.get_account_settings(&alert.account).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, account = %alert.account, "WebhookProcessor: settings unavailable, using defaults");
                AccountSettings::default()
            }
        };

        let already_processed = self
            .ctx
            .ledger
            .order_exists(&alert.alert_id, &alert.account)
            .await?;

        self.check_gate(alert, &instrument, &account, &settings, already_processed)
            .await?;

        let plan = self.plan(alert, &instrument).await?;
        let placed = self
            .ctx
            .broker
            .place_market_order(&account, &plan.order)
            .await?;

        let order = enrich_order(placed, alert, &plan);
        self.persist(&order, alert).await;
        Ok(order)
    }

    async fn check_gate(
        &self,
        alert: &Alert,
        instrument: &InstrumentSpec,
        account: &TradingAccount,
        settings: &AccountSettings,
        already_processed: bool,
    ) -> Result<(), ProcessError> {
        let now = Utc::now();
        let mut exposure: Option<Exposure> = None;
        loop {
            let input = GateInput {
                alert,
                instrument,
                settings,
                already_processed,
                exposure: exposure.as_ref(),
                now,
            };
            match self.ctx.gate.evaluate(&input) {
                Verdict::Approved => return Ok(()),
                Verdict::Rejected(reason) => return Err(reason.into()),
                Verdict::NeedsExposure if exposure.is_none() => {
                    let open = self.ctx.broker.active_orders(account, Page::all()).await?;
                    let fetched = Exposure::from_orders(&open);
                    debug!(
                        account = %account.login,
                        open_volume = fetched.open_volume,
                        buys = fetched.buy_count,
                        sells = fetched.sell_count,
                        "WebhookProcessor: exposure fetched"
                    );
                    exposure = Some(fetched);
                }
                Verdict::NeedsExposure => {
                    return Err(ProcessError::Unknown(
                        "risk gate requested exposure twice".to_string(),
                    ))
                }
            }
        }
    }

    async fn plan(&self, alert: &Alert, instrument: &InstrumentSpec) -> Result<OrderPlan, ProcessError> {
        let mut quote = self.ctx.quotes.get_quote(&alert.symbol).await;
        if quote.is_none() {
            debug!(symbol = %alert.symbol, "WebhookProcessor: no quote yet, waiting");
            tokio::time::sleep(self.ctx.queue_config.quote_wait).await;
            quote = self.ctx.quotes.get_quote(&alert.symbol).await;
        }
        Ok(plan_order(alert, instrument, quote.as_ref())?)
    }

    /// The order is already live at the broker, so ledger failures are logged only
    async fn persist(&self, order: &Order, alert: &Alert) {
        if let Err(e) = self.ctx.ledger.upsert_order(order).await {
            error!(
                error = %e,
                order_id = %order.order_id,
                alert_id = %alert.alert_id,
                "WebhookProcessor: placed order could not be stored"
            );
        }
        match self
            .ctx
            .ledger
            .update_max_size(&alert.account, alert.max_exposure)
            .await
        {
            Ok(rows) => debug!(account = %alert.account, rows = rows, "WebhookProcessor: max size refreshed"),
            Err(e) => warn!(error = %e, account = %alert.account, "WebhookProcessor: max size refresh failed"),
        }
    }
}

/// Attach the alert and quote context to the order the broker returned
pub fn enrich_order(mut order: Order, alert: &Alert, plan: &OrderPlan) -> Order {
    order.alert_id = Some(alert.alert_id.clone());
    order.reference_price = alert.reference_price;
    order.consider_reference = Some(alert.use_reference);
    order.bid_at_open = Some(plan.quote.bid);
    order.ask_at_open = Some(plan.quote.ask);
    order.spread_at_open = Some(plan.quote.spread());
    order.max_size = Some(alert.max_exposure);
    order.max_reference_age = alert.max_reference_age.clone();
    order.timeframe = alert.timeframe.clone();
    order.exchange = alert.exchange.clone();
    order.tags = alert.tags.clone();
    if order.open_price.is_none() {
        order.open_price = Some(plan.entry_price);
    }
    if order.take_profit.is_none() {
        order.take_profit = plan.order.take_profit;
    }
    if order.stop_loss.is_none() {
        order.stop_loss = plan.order.stop_loss;
    }
    order
}

#[async_trait]
impl JobProcessor for WebhookProcessor {
    async fn process(&self, job: &WebhookJob) -> Result<Order, ProcessError> {
        let started = Instant::now();
        let alert = &job.alert;
        info!(
            job_id = %job.id,
            account = %alert.account,
            alert_id = %alert.alert_id,
            symbol = %alert.symbol,
            side = %alert.side,
            attempt = job.retries + 1,
            "WebhookProcessor: processing alert"
        );

        let result = self.execute(job).await;
        match &result {
            Ok(order) => {
                if let Some(metrics) = &self.ctx.metrics {
                    metrics.orders_placed_total.inc();
                }
                self.ctx.outcomes.placed(alert, order).await;
            }
            Err(e) => {
                if e.outcome_status() == OutcomeStatus::Rejected {
                    if let Some(metrics) = &self.ctx.metrics {
                        metrics.orders_rejected_total.inc();
                    }
                }
                self.ctx.outcomes.failed(alert, e).await;
            }
        }

        debug!(
            job_id = %job.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "WebhookProcessor: job finished"
        );
        result
    }
}
