//! Candidate selection for the Plexus router
//!
//! Pure data-in/data-out: given provider profiles, rule tables, and health
//! snapshots, produce an ordered fallback chain of provider names. All I/O
//! (invoking adapters, recording usage, tracking health) happens in the
//! dispatch layer; this crate stays deterministic and unit-testable.

pub mod analysis;
pub mod error;
pub mod profile;
pub mod rule;
pub mod select;

pub use analysis::{RequestProfile, classify};
pub use error::RoutingError;
pub use profile::{ProviderProfile, ProviderTable};
pub use rule::{RouteRule, first_match};
pub use select::{CandidateState, Requirements, rank_by_cost, rank_by_latency};

/// Health state of a provider, written only by the circuit breaker
///
/// Degraded providers are deprioritized in ranking but still eligible;
/// unavailable providers are excluded from selection entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Normal operation
    Healthy,
    /// Repeatedly failing; ranked below healthy providers
    Degraded,
    /// Excluded from selection until a probe request succeeds
    Unavailable,
}
