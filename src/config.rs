//! Environment-driven configuration
//!
//! Every value is read once at startup. Binaries call `dotenvy::dotenv()`
//! before [`AppConfig::from_env`] so a local `.env` file is honoured.

use crate::error::ConfigError;
use crate::models::account::{CredentialSlot, Reality, TradingAccount};
use std::env;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://rest.simplefx.com/api/v3";
pub const DEFAULT_QUOTES_URL: &str = "wss://web-quotes-core.simplefx.com/websocket/quotes";
pub const DEFAULT_ACCOUNT: &str = "3979960";
pub const DEFAULT_MONITORED_ACCOUNTS: &str = "3979960,247341,3979937";
pub const DEFAULT_SUPPORTED_SYMBOLS: &str = "EURUSD,GBPUSD,USDJPY,US100,US500";

pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_database_url() -> String {
    env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://wingbot.db".to_string())
}

pub fn get_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

/// API key pair for one broker credential slot
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn from_env(id_key: &str, secret_key: &str) -> Option<Self> {
        let client_id = non_empty_var(id_key)?;
        let client_secret = non_empty_var(secret_key)?;
        Some(Self::new(client_id, client_secret))
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub api_url: String,
    pub quotes_url: String,
    pub primary_credentials: Option<Credentials>,
    pub secondary_credentials: Option<Credentials>,
    /// Account used when an alert does not name one
    pub default_account: String,
    /// Account that must be traded with the secondary credentials
    pub secondary_account: Option<String>,
    pub monitored_accounts: Vec<String>,
    pub live_accounts: Vec<String>,
    pub supported_symbols: Vec<String>,
    pub reconcile_interval_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            port: 8080,
            database_url: "sqlite://wingbot.db".to_string(),
            database_max_connections: 5,
            api_url: DEFAULT_API_URL.to_string(),
            quotes_url: DEFAULT_QUOTES_URL.to_string(),
            primary_credentials: None,
            secondary_credentials: None,
            default_account: DEFAULT_ACCOUNT.to_string(),
            secondary_account: None,
            monitored_accounts: split_list(DEFAULT_MONITORED_ACCOUNTS),
            live_accounts: split_list(DEFAULT_MONITORED_ACCOUNTS),
            supported_symbols: split_list(DEFAULT_SUPPORTED_SYMBOLS),
            reconcile_interval_seconds: 600,
        }
    }
}

impl AppConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let secondary_account = non_empty_var("DEFAULT_ACCOUNT_NUMBER2");
        let mut monitored_accounts = list_var("MONITORED_ACCOUNTS", DEFAULT_MONITORED_ACCOUNTS);
        if let Some(account) = &secondary_account {
            if !monitored_accounts.contains(account) {
                monitored_accounts.push(account.clone());
            }
        }

        let config = Self {
            environment: get_environment(),
            port: get_port(),
            database_url: get_database_url(),
            database_max_connections: parsed_var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            api_url: env::var("SIMPLEFX_API_URL").unwrap_or(defaults.api_url),
            quotes_url: env::var("SIMPLEFX_QUOTES_URL").unwrap_or(defaults.quotes_url),
            primary_credentials: Credentials::from_env("SIMPLEFX_API_KEY", "SIMPLEFX_API_SECRET"),
            secondary_credentials: Credentials::from_env(
                "SIMPLEFX_API_KEY2",
                "SIMPLEFX_API_SECRET2",
            ),
            default_account: non_empty_var("DEFAULT_ACCOUNT_NUMBER")
                .unwrap_or(defaults.default_account),
            secondary_account,
            monitored_accounts,
            live_accounts: list_var("LIVE_ACCOUNTS", DEFAULT_MONITORED_ACCOUNTS),
            supported_symbols: list_var("SUPPORTED_SYMBOLS", DEFAULT_SUPPORTED_SYMBOLS)
                .into_iter()
                .map(|s| s.to_uppercase())
                .collect(),
            reconcile_interval_seconds: parsed_var("RECONCILE_INTERVAL_SECONDS")
                .unwrap_or(defaults.reconcile_interval_seconds),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that the broker endpoints are well-formed URLs
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("SIMPLEFX_API_URL", &self.api_url),
            ("SIMPLEFX_QUOTES_URL", &self.quotes_url),
        ] {
            Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                key,
                value: value.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn is_live_account(&self, login: &str) -> bool {
        self.live_accounts.iter().any(|a| a == login)
    }

    pub fn requires_secondary(&self, login: &str) -> bool {
        self.secondary_account.as_deref() == Some(login)
    }

    /// Resolve an account number to the reality and credential slot used to trade it
    pub fn trading_account(&self, login: &str) -> TradingAccount {
        let reality = if self.is_live_account(login) {
            Reality::Live
        } else {
            Reality::Demo
        };
        let slot = if self.requires_secondary(login) {
            CredentialSlot::Secondary
        } else {
            CredentialSlot::Primary
        };
        TradingAccount::new(login, reality, slot)
    }

    pub fn credentials(&self, slot: CredentialSlot) -> Option<&Credentials> {
        match slot {
            CredentialSlot::Primary => self.primary_credentials.as_ref(),
            CredentialSlot::Secondary => self.secondary_credentials.as_ref(),
        }
    }

    pub fn is_supported_symbol(&self, symbol: &str) -> bool {
        self.supported_symbols.iter().any(|s| s == symbol)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn list_var(key: &str, default: &str) -> Vec<String> {
    match non_empty_var(key) {
        Some(value) => split_list(&value),
        None => split_list(default),
    }
}

/// Split a comma separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
