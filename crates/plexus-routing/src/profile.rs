use indexmap::IndexMap;
use plexus_config::{CapabilityFlags, Pricing, ProviderConfig, ProviderFamily};

/// Static profile of a configured provider, used for ranking
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Provider name (the config table key)
    pub name: String,
    /// Vendor protocol family
    pub family: ProviderFamily,
    /// Bound model identifier
    pub model: String,
    /// Price table
    pub pricing: Pricing,
    /// Capability flags
    pub capabilities: CapabilityFlags,
    /// Declaration position in configuration; breaks ranking ties
    pub order: usize,
}

impl ProviderProfile {
    /// Estimate the cost of a request in USD from token counts
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input = f64::from(input_tokens) / 1_000_000.0 * self.pricing.input_per_mtok;
        let output = f64::from(output_tokens) / 1_000_000.0 * self.pricing.output_per_mtok;
        input + output
    }
}

/// All configured provider profiles, in declaration order
#[derive(Debug, Clone, Default)]
pub struct ProviderTable {
    profiles: Vec<ProviderProfile>,
}

impl ProviderTable {
    /// Build the table from the provider section of the configuration
    pub fn from_config(providers: &IndexMap<String, ProviderConfig>) -> Self {
        let profiles = providers
            .iter()
            .enumerate()
            .map(|(order, (name, config))| ProviderProfile {
                name: name.clone(),
                family: config.family,
                model: config.model.clone(),
                pricing: config.pricing,
                capabilities: config.capabilities,
                order,
            })
            .collect();

        Self { profiles }
    }

    /// All profiles in declaration order
    pub fn profiles(&self) -> &[ProviderProfile] {
        &self.profiles
    }

    /// Look up a profile by provider name
    pub fn get(&self, name: &str) -> Option<&ProviderProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}
