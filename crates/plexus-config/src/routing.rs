use serde::Deserialize;

/// Routing configuration: selection mode, rules, health thresholds
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Candidate selection mode
    #[serde(default)]
    pub mode: RoutingMode,
    /// Per-candidate timeout in seconds
    ///
    /// A slow vendor must not block the rest of the fallback chain.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Circuit breaker thresholds
    #[serde(default)]
    pub health: HealthConfig,
    /// Ordered routing rules, evaluated first-match in `rules` mode
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::default(),
            request_timeout_secs: default_timeout_secs(),
            health: HealthConfig::default(),
            rules: Vec::new(),
        }
    }
}

/// How candidates are selected when the request does not name a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// First matching rule supplies the fallback chain
    #[default]
    Rules,
    /// Rank compatible providers by estimated cost, cheapest first
    Cost,
    /// Rank compatible providers by observed latency, fastest first
    Latency,
}

/// A routing rule: predicate plus ordered fallback chain
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Rule name, used in logs
    pub name: String,
    /// Predicate over request metadata; empty matches everything
    #[serde(default, rename = "match")]
    pub matches: RuleMatch,
    /// Provider names tried in order until one succeeds
    pub candidates: Vec<String>,
}

/// Predicate fields of a routing rule; absent fields always match
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleMatch {
    /// Glob over the caller identity (e.g. `"batch-*"`)
    #[serde(default)]
    pub caller: Option<String>,
    /// Exact privacy tag (e.g. `"restricted"`)
    #[serde(default)]
    pub privacy: Option<String>,
    /// Complexity class derived from the token estimate
    #[serde(default)]
    pub complexity: Option<Complexity>,
    /// Whether the request must (or must not) use tools
    #[serde(default)]
    pub requires_tools: Option<bool>,
}

/// Complexity class of a request, derived from its token estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    High,
}

/// Circuit breaker thresholds for provider health tracking
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Consecutive retryable failures before a provider is degraded
    #[serde(default = "default_degraded")]
    pub degraded_threshold: u32,
    /// Consecutive retryable failures before a provider is unavailable
    #[serde(default = "default_unavailable")]
    pub unavailable_threshold: u32,
    /// Sliding window for counting failures, in seconds
    #[serde(default = "default_window")]
    pub window_seconds: u64,
    /// How long an unavailable provider waits before one probe request
    #[serde(default = "default_probe")]
    pub probe_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_threshold: default_degraded(),
            unavailable_threshold: default_unavailable(),
            window_seconds: default_window(),
            probe_seconds: default_probe(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_degraded() -> u32 {
    3
}

const fn default_unavailable() -> u32 {
    6
}

const fn default_window() -> u64 {
    60
}

const fn default_probe() -> u64 {
    30
}
