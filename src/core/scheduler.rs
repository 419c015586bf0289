//! Cron-based scheduler for reconciliation sweeps

use crate::core::reconcile::Reconciler;
use crate::error::SchedulerError;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Runs one sweep on start, then one per cron tick
pub struct ReconciliationScheduler {
    reconciler: Arc<Reconciler>,
    schedule: Schedule,
    handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

/// Cron expression firing every `interval_seconds`
///
/// Cron format: second minute hour day month weekday
pub fn cron_expression(interval_seconds: u64) -> String {
    if interval_seconds >= 3600 && interval_seconds % 3600 == 0 {
        format!("0 0 */{} * * *", interval_seconds / 3600)
    } else if interval_seconds >= 60 {
        format!("0 */{} * * * *", interval_seconds / 60)
    } else {
        format!("*/{} * * * * *", interval_seconds)
    }
}

impl ReconciliationScheduler {
    pub fn new(reconciler: Arc<Reconciler>, interval_seconds: u64) -> Result<Self, SchedulerError> {
        if interval_seconds == 0 {
            return Err(SchedulerError::Disabled);
        }

        let expression = cron_expression(interval_seconds);
        let schedule =
            Schedule::from_str(&expression).map_err(|e| SchedulerError::InvalidSchedule {
                expression: expression.clone(),
                message: e.to_string(),
            })?;

        info!(
            interval = interval_seconds,
            cron = %expression,
            "ReconciliationScheduler: created"
        );

        Ok(Self {
            reconciler,
            schedule,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn start(&self) {
        let mut slot = self.handle.write().await;
        if slot.is_some() {
            debug!("ReconciliationScheduler: already running");
            return;
        }

        let reconciler = self.reconciler.clone();
        let schedule = self.schedule.clone();
        *slot = Some(tokio::spawn(async move {
            info!("ReconciliationScheduler: started, running initial sweep");
            reconciler.sweep().await;

            loop {
                match schedule.upcoming(chrono::Utc).next() {
                    Some(next_tick) => {
                        let wait = (next_tick - chrono::Utc::now()).to_std().unwrap_or_default();
                        tokio::time::sleep(wait).await;
                    }
                    None => {
                        tokio::time::sleep(reconciler.settings().interval).await;
                        continue;
                    }
                }

                debug!("ReconciliationScheduler: cron tick");
                reconciler.sweep().await;
            }
        }));
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.handle.write().await.take() {
            handle.abort();
            info!("ReconciliationScheduler: stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}
