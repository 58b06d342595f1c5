use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single upstream provider
///
/// A provider binds a vendor family to one model, a credential, a price
/// table, and capability flags. Fallback chains reference providers by
/// their table key.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Vendor protocol family
    pub family: ProviderFamily,
    /// Model identifier sent to the vendor
    pub model: String,
    /// API key, normally `{{ env.SOME_VAR }}` in the config file
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Price table for cost estimation and ledger accounting
    #[serde(default)]
    pub pricing: Pricing,
    /// What the vendor/model combination supports
    #[serde(default)]
    pub capabilities: CapabilityFlags,
}

/// Supported vendor protocol families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// OpenAI-compatible chat completions API
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
}

impl ProviderFamily {
    /// Lowercase family name for logs and error messages
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }
}

/// Cost per million tokens in USD
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pricing {
    /// Cost per million input tokens
    #[serde(default)]
    pub input_per_mtok: f64,
    /// Cost per million output tokens
    #[serde(default)]
    pub output_per_mtok: f64,
}

/// Capability flags for a provider/model combination
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityFlags {
    /// Whether streaming responses are supported
    #[serde(default = "default_true")]
    pub streaming: bool,
    /// Whether tool/function calling is supported
    #[serde(default = "default_true")]
    pub tool_calling: bool,
    /// Maximum context window in tokens
    #[serde(default = "default_context_tokens")]
    pub max_context_tokens: u32,
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self {
            streaming: true,
            tool_calling: true,
            max_context_tokens: default_context_tokens(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_context_tokens() -> u32 {
    128_000
}
