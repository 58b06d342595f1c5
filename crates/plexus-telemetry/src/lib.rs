//! Logging initialization for Plexus
//!
//! Sets up the `tracing-subscriber` stack from configuration: an
//! `EnvFilter` (config directive, falling back to `RUST_LOG`, falling back
//! to `info`) and either human-readable or JSON line output. Secrets are
//! never logged anywhere in the workspace; this module only controls
//! formatting and filtering.

use plexus_config::TelemetryConfig;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Held for the lifetime of the process for symmetric shutdown
pub struct TelemetryGuard {
    _private: (),
}

/// Initialize the global subscriber from configuration
///
/// Call once at startup, before any spans are created.
///
/// # Errors
///
/// Returns an error when the configured filter directive is invalid or a
/// subscriber is already installed.
pub fn init(config: Option<&TelemetryConfig>) -> anyhow::Result<TelemetryGuard> {
    let filter = match config.and_then(|c| c.filter.as_deref()) {
        Some(directive) => {
            EnvFilter::try_new(directive).map_err(|e| anyhow::anyhow!("invalid log filter '{directive}': {e}"))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.is_some_and(|c| c.json) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;
    }

    Ok(TelemetryGuard { _private: () })
}
