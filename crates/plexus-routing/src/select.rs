//! Ranking of capability-compatible providers
//!
//! Cost and latency modes rank every compatible, non-unavailable provider
//! and return the full ranking as the fallback chain. Degraded providers
//! stay eligible but sort after healthy ones regardless of price or speed;
//! remaining ties fall back to configuration declaration order so ranking
//! is deterministic.

use std::cmp::Ordering;

use crate::HealthState;
use crate::error::RoutingError;
use crate::profile::ProviderProfile;

/// What a request requires from a provider
#[derive(Debug, Clone, Copy, Default)]
pub struct Requirements {
    /// Request defines tools
    pub tool_calling: bool,
    /// Request asked for a streamed response
    pub streaming: bool,
    /// Estimated input tokens; must fit the provider's context window
    pub input_tokens: u32,
}

/// A provider profile joined with its runtime observations
#[derive(Debug, Clone)]
pub struct CandidateState<'a> {
    /// Static profile from configuration
    pub profile: &'a ProviderProfile,
    /// Current circuit breaker state
    pub health: HealthState,
    /// Rolling average latency from the ledger, if any samples exist
    pub avg_latency_ms: Option<f64>,
}

impl CandidateState<'_> {
    fn eligible(&self, requires: Requirements) -> bool {
        if self.health == HealthState::Unavailable {
            return false;
        }
        let caps = &self.profile.capabilities;
        if requires.tool_calling && !caps.tool_calling {
            return false;
        }
        if requires.streaming && !caps.streaming {
            return false;
        }
        requires.input_tokens <= caps.max_context_tokens
    }

    fn degraded_rank(&self) -> u8 {
        u8::from(self.health == HealthState::Degraded)
    }
}

/// Rank compatible providers by estimated request cost, cheapest first
///
/// # Errors
///
/// Returns `NoCandidates` when no compatible provider remains.
pub fn rank_by_cost(
    candidates: &[CandidateState<'_>],
    requires: Requirements,
    input_tokens: u32,
    output_tokens: u32,
) -> Result<Vec<String>, RoutingError> {
    let mut eligible: Vec<&CandidateState<'_>> = candidates.iter().filter(|c| c.eligible(requires)).collect();

    eligible.sort_by(|a, b| {
        a.degraded_rank()
            .cmp(&b.degraded_rank())
            .then_with(|| {
                let cost_a = a.profile.estimate_cost(input_tokens, output_tokens);
                let cost_b = b.profile.estimate_cost(input_tokens, output_tokens);
                cost_a.partial_cmp(&cost_b).unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.profile.order.cmp(&b.profile.order))
    });

    chain_from(eligible)
}

/// Rank compatible providers by observed latency, fastest first
///
/// Providers without latency samples rank after those with samples, in
/// declaration order.
///
/// # Errors
///
/// Returns `NoCandidates` when no compatible provider remains.
pub fn rank_by_latency(candidates: &[CandidateState<'_>], requires: Requirements) -> Result<Vec<String>, RoutingError> {
    let mut eligible: Vec<&CandidateState<'_>> = candidates.iter().filter(|c| c.eligible(requires)).collect();

    eligible.sort_by(|a, b| {
        a.degraded_rank()
            .cmp(&b.degraded_rank())
            .then_with(|| match (a.avg_latency_ms, b.avg_latency_ms) {
                (Some(la), Some(lb)) => la.partial_cmp(&lb).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.profile.order.cmp(&b.profile.order))
    });

    chain_from(eligible)
}

fn chain_from(eligible: Vec<&CandidateState<'_>>) -> Result<Vec<String>, RoutingError> {
    if eligible.is_empty() {
        return Err(RoutingError::NoCandidates);
    }
    Ok(eligible.into_iter().map(|c| c.profile.name.clone()).collect())
}
