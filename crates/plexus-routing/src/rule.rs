use plexus_config::RuleConfig;

use crate::analysis::RequestProfile;

/// A compiled routing rule
///
/// Rules are immutable after load and evaluated first-match in
/// configuration order. The candidate chain is the fallback order for any
/// request the rule captures; candidates never come from anywhere else.
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Rule name, used in logs
    pub name: String,
    /// Caller glob (e.g. `"batch-*"`); absent matches any caller
    caller: Option<String>,
    /// Exact privacy tag; absent matches any
    privacy: Option<String>,
    /// Complexity class; absent matches any
    complexity: Option<plexus_config::Complexity>,
    /// Tool usage requirement; absent matches any
    requires_tools: Option<bool>,
    /// Ordered provider names forming the fallback chain
    pub candidates: Vec<String>,
}

impl RouteRule {
    /// Compile a rule from configuration
    pub fn from_config(config: &RuleConfig) -> Self {
        Self {
            name: config.name.clone(),
            caller: config.matches.caller.clone(),
            privacy: config.matches.privacy.clone(),
            complexity: config.matches.complexity,
            requires_tools: config.matches.requires_tools,
            candidates: config.candidates.clone(),
        }
    }

    /// Whether this rule captures the given request
    pub fn matches(&self, profile: &RequestProfile) -> bool {
        if let Some(glob) = &self.caller
            && !fast_glob::glob_match(glob, &profile.caller)
        {
            return false;
        }

        if let Some(privacy) = &self.privacy
            && profile.privacy.as_deref() != Some(privacy.as_str())
        {
            return false;
        }

        if let Some(complexity) = self.complexity
            && profile.complexity() != complexity
        {
            return false;
        }

        if let Some(requires_tools) = self.requires_tools
            && profile.has_tools != requires_tools
        {
            return false;
        }

        true
    }
}

/// Find the first rule that captures the request, in declaration order
pub fn first_match<'a>(rules: &'a [RouteRule], profile: &RequestProfile) -> Option<&'a RouteRule> {
    let matched = rules.iter().find(|rule| rule.matches(profile));

    if let Some(rule) = matched {
        tracing::debug!(rule = %rule.name, caller = %profile.caller, "routing rule matched");
    }

    matched
}
