//! Request metadata used by rule predicates
//!
//! Complexity is a coarse classification from the pre-routing token
//! estimate. No content inspection happens here; the gateway never parses
//! message text for routing.

use plexus_config::Complexity;

/// Token estimate above which a request counts as high complexity
const HIGH_COMPLEXITY_TOKENS: u32 = 4_000;

/// Metadata a routing rule can match against
#[derive(Debug, Clone)]
pub struct RequestProfile {
    /// Logical caller identity
    pub caller: String,
    /// Privacy tag supplied by the caller
    pub privacy: Option<String>,
    /// Heuristic input token estimate
    pub estimated_input_tokens: u32,
    /// Whether the request defines tools
    pub has_tools: bool,
}

impl RequestProfile {
    /// Complexity class of this request
    pub fn complexity(&self) -> Complexity {
        classify(self.estimated_input_tokens)
    }
}

/// Classify a token estimate into a complexity class
pub fn classify(estimated_input_tokens: u32) -> Complexity {
    if estimated_input_tokens > HIGH_COMPLEXITY_TOKENS {
        Complexity::High
    } else {
        Complexity::Low
    }
}
