//! Configuration for the Plexus gateway
//!
//! Loaded once at startup from a TOML file with `{{ env.VAR }}` expansion.
//! Hot reload is deliberately unsupported; provider and rule tables are
//! immutable after load.

mod env;
mod loader;
pub mod providers;
pub mod routing;
pub mod server;
pub mod telemetry;

use indexmap::IndexMap;
use serde::Deserialize;

pub use providers::{CapabilityFlags, Pricing, ProviderConfig, ProviderFamily};
pub use routing::{Complexity, HealthConfig, RoutingConfig, RoutingMode, RuleConfig, RuleMatch};
pub use server::ServerConfig;
pub use telemetry::TelemetryConfig;

/// Top-level Plexus configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream provider configurations keyed by name
    ///
    /// Declaration order is preserved and breaks ranking ties.
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Routing configuration
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
