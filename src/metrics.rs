//! Prometheus metrics for the pipeline

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,

    pub webhooks_received_total: IntCounter,
    pub webhooks_duplicate_total: IntCounter,
    pub orders_placed_total: IntCounter,
    pub orders_rejected_total: IntCounter,
    pub job_failures_total: IntCounter,
    pub job_retries_total: IntCounter,
    pub queue_length: IntGauge,

    pub broker_requests_total: IntCounter,
    pub broker_authentications_total: IntCounter,

    pub quote_feed_connected: Gauge,
    pub quote_updates_total: IntCounter,
    pub database_connected: Gauge,

    pub reconciliation_sweeps_total: IntCounter,
    pub reconciliation_orders_synced_total: IntCounter,
    pub reconciliation_failures_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            http_requests_total: counter(&registry, "http_requests_total", "HTTP requests served")?,
            http_requests_in_flight: int_gauge(
                &registry,
                "http_requests_in_flight",
                "HTTP requests currently being served",
            )?,
            http_request_duration_seconds,
            webhooks_received_total: counter(
                &registry,
                "webhooks_received_total",
                "Alerts accepted onto the queue",
            )?,
            webhooks_duplicate_total: counter(
                &registry,
                "webhooks_duplicate_total",
                "Alerts dropped as duplicates",
            )?,
            orders_placed_total: counter(
                &registry,
                "orders_placed_total",
                "Market orders placed with the broker",
            )?,
            orders_rejected_total: counter(
                &registry,
                "orders_rejected_total",
                "Alerts rejected by the risk gate",
            )?,
            job_failures_total: counter(
                &registry,
                "job_failures_total",
                "Webhook jobs that ended in an error",
            )?,
            job_retries_total: counter(
                &registry,
                "job_retries_total",
                "Webhook jobs scheduled for another attempt",
            )?,
            queue_length: int_gauge(&registry, "webhook_queue_length", "Jobs waiting in the queue")?,
            broker_requests_total: counter(
                &registry,
                "broker_requests_total",
                "Authenticated requests sent to the broker",
            )?,
            broker_authentications_total: counter(
                &registry,
                "broker_authentications_total",
                "Authentication requests sent to the broker",
            )?,
            quote_feed_connected: gauge(
                &registry,
                "quote_feed_connected",
                "1 when the quote stream is connected",
            )?,
            quote_updates_total: counter(
                &registry,
                "quote_updates_total",
                "Quote updates received from the stream",
            )?,
            database_connected: gauge(
                &registry,
                "database_connected",
                "1 when the ledger database is reachable",
            )?,
            reconciliation_sweeps_total: counter(
                &registry,
                "reconciliation_sweeps_total",
                "Completed reconciliation sweeps",
            )?,
            reconciliation_orders_synced_total: counter(
                &registry,
                "reconciliation_orders_synced_total",
                "Orders merged into the ledger by reconciliation",
            )?,
            reconciliation_failures_total: counter(
                &registry,
                "reconciliation_failures_total",
                "Accounts that failed every reconciliation attempt",
            )?,
            registry,
        })
    }

    /// Render all metrics in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let gauge = IntGauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let gauge = Gauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}
