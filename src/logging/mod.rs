//! Logging initialization with environment-based formatters
//!
//! - Production: JSON lines on stdout for the log shipper
//! - Anything else: colored human-readable lines

use crate::config::get_environment;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer, Registry,
};

/// Used when `RUST_LOG` is unset; sqlx logs every statement at info.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn for_environment(env: &str) -> Self {
        match env.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

fn stdout_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let base = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stdout);

    match format {
        LogFormat::Json => base.json().with_filter(env_filter()).boxed(),
        LogFormat::Pretty => base.with_ansi(true).with_filter(env_filter()).boxed(),
    }
}

/// Install the global subscriber for one of the binaries.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(service: &'static str) -> Result<(), TryInitError> {
    let format = LogFormat::for_environment(&get_environment());
    tracing_subscriber::registry()
        .with(stdout_layer(format))
        .try_init()?;

    tracing::info!(service, ?format, "Logging initialised");
    Ok(())
}
