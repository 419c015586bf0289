//! Job and queue types

use crate::models::{Alert, ProcessedAlertKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One accepted alert waiting for the processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookJob {
    pub id: String,
    pub alert: Alert,
    pub enqueued_at: DateTime<Utc>,
    /// Retries already spent on this job
    pub retries: u32,
}

impl WebhookJob {
    pub fn new(alert: Alert) -> Self {
        let enqueued_at = Utc::now();
        Self {
            id: format!(
                "{}_{}_{}",
                alert.alert_id,
                alert.account,
                enqueued_at.timestamp_millis()
            ),
            alert,
            enqueued_at,
            retries: 0,
        }
    }

    pub fn key(&self) -> ProcessedAlertKey {
        self.alert.key()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub processing: bool,
    pub processed_ids_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Queued { job_id: String, status: QueueStatus },
    Duplicate,
    /// The queue is shutting down and accepts no more work
    Closed,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub duplicate_window: Duration,
    pub inter_job_pause: Duration,
    /// How long the processor waits once for a missing quote
    pub quote_wait: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            duplicate_window: Duration::from_secs(30),
            inter_job_pause: Duration::from_millis(100),
            quote_wait: Duration::from_millis(500),
        }
    }
}
