//! HTTP adapter over the trading service using Axum

use axum::{
    extract::{MatchedPath, Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, error, info, warn, Level};

use crate::core::service::{ServiceError, SubmitResponse, TradingService};
use crate::metrics::Metrics;
use crate::models::Timeframe;
use crate::services::simplefx::QuoteFeed;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TradingService>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub feed: Option<Arc<QuoteFeed>>,
}

impl AppState {
    pub fn new(service: Arc<TradingService>, metrics: Arc<Metrics>) -> Self {
        Self {
            service,
            metrics,
            start_time: Arc::new(Instant::now()),
            feed: None,
        }
    }

    pub fn with_feed(mut self, feed: Arc<QuoteFeed>) -> Self {
        self.feed = Some(feed);
        self
    }
}

/// JSON error body with the status that matches the failure
struct ApiError(StatusCode, String);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::InvalidAlert(_) => StatusCode::BAD_REQUEST,
            ServiceError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Broker(_) | ServiceError::Sync(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "HTTP handler failed");
        }
        ApiError(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(SubmitResponse::failure(self.1))).into_response()
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = state.service.ledger().ping().await.is_ok();
    state
        .metrics
        .database_connected
        .set(if database { 1.0 } else { 0.0 });

    let quote_feed = match &state.feed {
        Some(feed) => Some(feed.is_connected().await),
        None => None,
    };

    Json(json!({
        "status": if database { "healthy" } else { "degraded" },
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": "wingbot",
        "database": database,
        "quote_feed_connected": quote_feed,
        "queue": state.service.queue_status().await,
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Counts requests; failures are logged under the matched route template
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    state.metrics.http_requests_in_flight.dec();

    let elapsed = started.elapsed();
    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(elapsed.as_secs_f64());

    let status = response.status();
    if status.is_server_error() {
        error!(%method, %route, %status, elapsed_ms = elapsed.as_millis(), "HTTP: request failed");
    } else if status.is_client_error() {
        debug!(%method, %route, %status, "HTTP: request rejected");
    }

    response
}

/// Alerts arrive as raw JSON; some senders omit the content type
async fn receive_webhook(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<SubmitResponse>, ApiError> {
    let payload: Value = serde_json::from_str(&body).map_err(|e| {
        warn!(error = %e, "Webhook body is not valid JSON");
        ApiError(StatusCode::BAD_REQUEST, format!("Invalid JSON payload: {}", e))
    })?;
    Ok(Json(state.service.submit_alert(&payload).await?))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChartQuery {
    timeframe: Option<String>,
    bars: Option<i64>,
    account: Option<String>,
}

async fn list_accounts(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "success": true, "accounts": state.service.accounts() }))
}

async fn account_orders(
    State(state): State<AppState>,
    Path(login): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let orders = state
        .service
        .recent_orders(&login, params.limit.unwrap_or_default())
        .await?;
    Ok(Json(json!({ "success": true, "orders": orders })))
}

async fn account_outcomes(
    State(state): State<AppState>,
    Path(login): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let outcomes = state
        .service
        .outcomes(&login, params.limit.unwrap_or_default())
        .await?;
    Ok(Json(json!({ "success": true, "outcomes": outcomes })))
}

async fn account_settings(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let settings = state.service.settings(&login).await?;
    Ok(Json(json!({ "success": true, "settings": settings })))
}

async fn account_status(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let status = state.service.account_status(&login).await?;
    Ok(Json(json!({ "success": true, "account": status })))
}

async fn account_deposits(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deposits = state.service.deposit_history(&login).await?;
    Ok(Json(json!({ "success": true, "deposits": deposits })))
}

async fn close_all_positions(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let result = state.service.close_all(&login).await?;
    Ok(Json(json!({ "success": true, "result": result })))
}

async fn recent_logs(
    State(state): State<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let logs = state
        .service
        .log_entries(params.limit.unwrap_or_default())
        .await?;
    Ok(Json(json!({ "success": true, "logs": logs })))
}

async fn chart_data(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<ChartQuery>,
) -> Json<Value> {
    let timeframe = params
        .timeframe
        .as_deref()
        .map(Timeframe::parse)
        .unwrap_or_default();
    let chart = state
        .service
        .chart(&symbol, timeframe, params.bars, params.account.as_deref())
        .await;
    Json(json!({ "success": true, "chart": chart }))
}

async fn sync_account(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let sync = state.service.sync_account(&login).await?;
    Ok(Json(json!({ "success": true, "sync": sync })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/webhook", post(receive_webhook))
        .route("/api/accounts", get(list_accounts))
        .route("/api/accounts/{login}/orders", get(account_orders))
        .route("/api/accounts/{login}/outcomes", get(account_outcomes))
        .route("/api/accounts/{login}/settings", get(account_settings))
        .route("/api/accounts/{login}/status", get(account_status))
        .route("/api/accounts/{login}/deposits", get(account_deposits))
        .route("/api/accounts/{login}/close-all", post(close_all_positions))
        .route("/api/logs", get(recent_logs))
        .route("/api/chart/{symbol}", get(chart_data))
        .route("/api/sync/{login}", post(sync_account))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server<F>(
    state: AppState,
    port: u16,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
