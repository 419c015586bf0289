//! Bearer token lifecycle for the SimpleFX REST API
//!
//! The broker answers concurrent `/auth/key` calls with 409, so every
//! refresh goes through one process-wide lock. Callers that find the token
//! missing or expired queue on the lock and re-check the cache once they
//! hold it, so a burst of callers triggers a single network request.

use super::messages::{ApiErrorBody, AuthRequest, AuthResponse};
use crate::config::Credentials;
use crate::error::BrokerError;
use crate::metrics::Metrics;
use crate::models::CredentialSlot;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const INVALID_CREDENTIALS_MARKER: &str = "INVALID_CREDENTIALS";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_ttl: Duration,
    /// Total authentication attempts when the broker answers 409
    pub max_attempts: u32,
    /// Delay before retry `n` is `conflict_backoff * n`
    pub conflict_backoff: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(3600),
            max_attempts: 3,
            conflict_backoff: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
struct AuthToken {
    token: String,
    expires_at: Instant,
}

impl AuthToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

pub struct TokenManager {
    http: reqwest::Client,
    auth_url: String,
    credentials: HashMap<CredentialSlot, Credentials>,
    tokens: RwLock<HashMap<CredentialSlot, AuthToken>>,
    auth_lock: Mutex<()>,
    config: AuthConfig,
    metrics: Option<Arc<Metrics>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        credentials: HashMap<CredentialSlot, Credentials>,
        config: AuthConfig,
    ) -> Self {
        Self {
            http,
            auth_url: format!("{}/auth/key", base_url.trim_end_matches('/')),
            credentials,
            tokens: RwLock::new(HashMap::new()),
            auth_lock: Mutex::new(()),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn has_credentials(&self, slot: CredentialSlot) -> bool {
        self.credentials.contains_key(&slot)
    }

    /// Return a valid token for the slot, authenticating if needed
    pub async fn token(&self, slot: CredentialSlot) -> Result<String, BrokerError> {
        if let Some(token) = self.cached(slot).await {
            return Ok(token);
        }

        let _guard = self.auth_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = self.cached(slot).await {
            debug!(slot = ?slot, "TokenManager: token refreshed by concurrent caller");
            return Ok(token);
        }

        let token = self.authenticate(slot).await?;
        self.tokens.write().await.insert(
            slot,
            AuthToken {
                token: token.clone(),
                expires_at: Instant::now() + self.config.token_ttl,
            },
        );
        info!(slot = ?slot, ttl_secs = self.config.token_ttl.as_secs(), "TokenManager: new access token cached");
        Ok(token)
    }

    /// Drop the cached token if it is still the one that was rejected
    pub async fn invalidate(&self, slot: CredentialSlot, rejected: &str) {
        let mut tokens = self.tokens.write().await;
        if tokens.get(&slot).is_some_and(|t| t.token == rejected) {
            tokens.remove(&slot);
            warn!(slot = ?slot, "TokenManager: cleared rejected access token");
        }
    }

    async fn cached(&self, slot: CredentialSlot) -> Option<String> {
        let tokens = self.tokens.read().await;
        tokens
            .get(&slot)
            .filter(|t| t.is_valid())
            .map(|t| t.token.clone())
    }

    async fn authenticate(&self, slot: CredentialSlot) -> Result<String, BrokerError> {
        let credentials = self
            .credentials
            .get(&slot)
            .ok_or(BrokerError::MissingCredentials(slot))?;

        let mut attempt: u32 = 0;
        loop {
            match self.request_token(credentials).await {
                Ok(token) => return Ok(token),
                Err(BrokerError::AuthConflict(message)) if attempt + 1 < self.config.max_attempts => {
                    attempt += 1;
                    let delay = self.config.conflict_backoff * attempt;
                    warn!(
                        slot = ?slot,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        message = %message,
                        "TokenManager: authentication conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_token(&self, credentials: &Credentials) -> Result<String, BrokerError> {
        if let Some(metrics) = &self.metrics {
            metrics.broker_authentications_total.inc();
        }

        let response = self
            .http
            .post(&self.auth_url)
            .json(&AuthRequest {
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: AuthResponse = response.json().await?;
            return Ok(body.data.token);
        }

        let raw = response.text().await.unwrap_or_default();
        let message = ApiErrorBody::describe(&raw);
        Err(match status {
            StatusCode::CONFLICT if raw.to_uppercase().contains(INVALID_CREDENTIALS_MARKER) => {
                BrokerError::InvalidCredentials(message)
            }
            StatusCode::CONFLICT => BrokerError::AuthConflict(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                BrokerError::InvalidCredentials(message)
            }
            other => BrokerError::Http {
                status: other.as_u16(),
                message,
            },
        })
    }
}
