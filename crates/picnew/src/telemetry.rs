//! Tracing subscriber setup for the registration service.
//!
//! Filtering resolves in two stages: an explicit `RUST_LOG` wins, and the
//! configured `APP_LOG_LEVEL` is the fallback. Output is compact and
//! ANSI-free so container log collectors ingest it verbatim.

use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter directive {directive:?}")]
    InvalidFilter {
        directive: String,
        source: ParseError,
    },
    #[error("tracing subscriber already installed")]
    AlreadyInitialized(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::InvalidFilter {
        directive: config.log_level.clone(),
        source,
    })
}

/// Install the global subscriber. Call once at process start; a second
/// call reports [`TelemetryError::AlreadyInitialized`].
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::AlreadyInitialized)
}
