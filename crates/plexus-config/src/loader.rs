use std::path::Path;

use crate::{Config, RoutingMode};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result. Secrets are resolved here,
    /// once, at startup; a missing credential is fatal rather than a
    /// per-request condition.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, variable expansion
    /// fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no providers are configured, a rule references
    /// an unknown provider, or thresholds are inconsistent
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_providers()?;
        self.validate_rules()?;
        self.validate_health()?;
        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            if provider.model.is_empty() {
                anyhow::bail!("provider '{name}' has an empty model");
            }
            if provider.pricing.input_per_mtok < 0.0 || provider.pricing.output_per_mtok < 0.0 {
                anyhow::bail!("provider '{name}' has a negative price");
            }
        }

        Ok(())
    }

    fn validate_rules(&self) -> anyhow::Result<()> {
        if self.routing.mode == RoutingMode::Rules && self.routing.rules.is_empty() {
            anyhow::bail!("routing mode is 'rules' but no rules are configured");
        }

        for rule in &self.routing.rules {
            if rule.candidates.is_empty() {
                anyhow::bail!("routing rule '{}' has an empty candidate chain", rule.name);
            }
            for candidate in &rule.candidates {
                if !self.providers.contains_key(candidate) {
                    anyhow::bail!(
                        "routing rule '{}' references unknown provider '{candidate}'",
                        rule.name
                    );
                }
            }
        }

        Ok(())
    }

    fn validate_health(&self) -> anyhow::Result<()> {
        let health = &self.routing.health;
        if health.degraded_threshold == 0 {
            anyhow::bail!("routing.health.degraded_threshold must be greater than 0");
        }
        if health.unavailable_threshold < health.degraded_threshold {
            anyhow::bail!("routing.health.unavailable_threshold must be >= degraded_threshold");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn minimal_config_validates() {
        let config = parse(
            r#"
            [providers.main]
            family = "openai"
            model = "gpt-4o"
            "#,
        );
        config.validate().unwrap();
    }

    #[test]
    fn empty_providers_rejected() {
        let config = parse("");
        // Default mode is rules with no rules, but the provider check fires first
        assert!(config.validate().is_err());
    }

    #[test]
    fn rule_with_unknown_candidate_rejected() {
        let config = parse(
            r#"
            [providers.main]
            family = "openai"
            model = "gpt-4o"

            [[routing.rules]]
            name = "default"
            candidates = ["missing"]
            "#,
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn cost_mode_needs_no_rules() {
        let config = parse(
            r#"
            [providers.main]
            family = "anthropic"
            model = "claude-sonnet-4-20250514"

            [routing]
            mode = "cost"
            "#,
        );
        config.validate().unwrap();
    }

    #[test]
    fn inverted_health_thresholds_rejected() {
        let config = parse(
            r#"
            [providers.main]
            family = "openai"
            model = "gpt-4o"

            [routing]
            mode = "cost"
            [routing.health]
            degraded_threshold = 5
            unavailable_threshold = 2
            "#,
        );
        assert!(config.validate().is_err());
    }
}
