//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use plexus_config::{
    CapabilityFlags, Config, HealthConfig, Pricing, ProviderConfig, ProviderFamily, RoutingMode, RuleConfig, RuleMatch,
    ServerConfig,
};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal defaults: loopback listener, no providers, no rules
    pub fn new() -> Self {
        let mut config = Config::default();
        config.server = ServerConfig {
            listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
            ..ServerConfig::default()
        };
        Self { config }
    }

    /// Add an OpenAI-family provider pointed at a mock backend
    pub fn with_provider(self, name: &str, base_url: &str) -> Self {
        self.with_priced_provider(name, base_url, 0.15, 0.6)
    }

    /// Add a provider with an explicit price table
    pub fn with_priced_provider(mut self, name: &str, base_url: &str, input_per_mtok: f64, output_per_mtok: f64) -> Self {
        self.config.providers.insert(
            name.to_owned(),
            ProviderConfig {
                family: ProviderFamily::Openai,
                model: "mock-model-1".to_owned(),
                api_key: Some(SecretString::from("test-key")),
                base_url: Some(base_url.parse().expect("valid URL")),
                pricing: Pricing {
                    input_per_mtok,
                    output_per_mtok,
                },
                capabilities: CapabilityFlags::default(),
            },
        );
        self
    }

    /// Restrict the capabilities of an already-added provider
    pub fn with_capabilities(mut self, name: &str, capabilities: CapabilityFlags) -> Self {
        self.config
            .providers
            .get_mut(name)
            .expect("provider must be added first")
            .capabilities = capabilities;
        self
    }

    /// Add a catch-all rule with the given fallback chain
    pub fn with_chain(self, name: &str, candidates: &[&str]) -> Self {
        self.with_rule(name, RuleMatch::default(), candidates)
    }

    /// Add a rule with an explicit predicate
    pub fn with_rule(mut self, name: &str, matches: RuleMatch, candidates: &[&str]) -> Self {
        self.config.routing.rules.push(RuleConfig {
            name: name.to_owned(),
            matches,
            candidates: candidates.iter().map(|&c| c.to_owned()).collect(),
        });
        self
    }

    /// Set the routing mode
    pub fn with_mode(mut self, mode: RoutingMode) -> Self {
        self.config.routing.mode = mode;
        self
    }

    /// Set circuit breaker thresholds
    pub fn with_health(mut self, health: HealthConfig) -> Self {
        self.config.routing.health = health;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
