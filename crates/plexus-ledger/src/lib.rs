//! Append-only usage ledger
//!
//! Every attempt against an upstream provider leaves a record here:
//! successes with token counts and computed cost, failures and
//! cancellations with zero cost. Records are never mutated after insertion,
//! only aggregated. The ledger is the sole owner of its records; readers
//! get computed aggregates, never references into the store.

use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use plexus_config::Pricing;

/// How many recent records feed the rolling latency average
const LATENCY_WINDOW: usize = 256;

/// Final disposition of one attempt against a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// First candidate succeeded
    Success,
    /// A later candidate in the fallback chain succeeded
    Fallback,
    /// The attempt failed
    Error,
    /// The client went away before the response completed
    Cancelled,
}

impl Outcome {
    /// Whether this outcome represents a completed, billable response
    pub const fn is_billable(self) -> bool {
        matches!(self, Self::Success | Self::Fallback)
    }
}

/// One attempt against an upstream provider
#[derive(Debug, Clone)]
pub struct UsageRecord {
    /// When the attempt finished
    pub timestamp: SystemTime,
    /// Provider that was invoked
    pub provider: String,
    /// Model that was requested
    pub model: String,
    /// Logical caller that issued the request
    pub caller: String,
    /// Prompt tokens consumed (zero for failures)
    pub input_tokens: u32,
    /// Completion tokens generated (zero for failures)
    pub output_tokens: u32,
    /// Cost in USD computed from actual usage and the price table
    pub cost_usd: f64,
    /// Pre-call cost estimate the router used, kept so estimate drift
    /// stays visible (divergence from `cost_usd` is expected)
    pub estimated_cost_usd: f64,
    /// Wall-clock latency of the attempt
    pub latency: Duration,
    /// Final disposition
    pub outcome: Outcome,
}

/// Filter for aggregate queries; absent fields match everything
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Restrict to one provider
    pub provider: Option<String>,
    /// Restrict to one caller
    pub caller: Option<String>,
    /// Restrict to records at or after this instant
    pub since: Option<SystemTime>,
    /// Restrict to one outcome
    pub outcome: Option<Outcome>,
}

impl RecordFilter {
    fn matches(&self, record: &UsageRecord) -> bool {
        if let Some(provider) = &self.provider
            && record.provider != *provider
        {
            return false;
        }
        if let Some(caller) = &self.caller
            && record.caller != *caller
        {
            return false;
        }
        if let Some(since) = self.since
            && record.timestamp < since
        {
            return false;
        }
        if let Some(outcome) = self.outcome
            && record.outcome != outcome
        {
            return false;
        }
        true
    }
}

/// Aggregate statistics over a filtered set of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateStats {
    /// Sum of recorded costs in USD
    pub total_cost_usd: f64,
    /// Number of matching records
    pub total_requests: u64,
    /// Mean latency in milliseconds over matching records
    pub avg_latency_ms: f64,
    /// Fraction of matching records with outcome `Error` (0.0 to 1.0)
    pub error_rate: f64,
}

/// Thread-safe append-only store of usage records
#[derive(Debug, Default)]
pub struct Ledger {
    records: RwLock<Vec<UsageRecord>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record
    ///
    /// Never blocks on anything but the internal lock; the record is
    /// immutable from here on.
    pub fn record(&self, record: UsageRecord) {
        tracing::debug!(
            provider = %record.provider,
            caller = %record.caller,
            outcome = ?record.outcome,
            cost_usd = record.cost_usd,
            latency_ms = record.latency.as_millis() as u64,
            "usage recorded"
        );

        self.records.write().unwrap_or_else(std::sync::PoisonError::into_inner).push(record);
    }

    /// Aggregate matching records
    pub fn aggregate(&self, filter: &RecordFilter) -> AggregateStats {
        let records = self.records.read().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut stats = AggregateStats::default();
        let mut latency_sum_ms = 0.0;
        let mut errors = 0u64;

        for record in records.iter().filter(|r| filter.matches(r)) {
            stats.total_requests += 1;
            stats.total_cost_usd += record.cost_usd;
            latency_sum_ms += record.latency.as_secs_f64() * 1000.0;
            if record.outcome == Outcome::Error {
                errors += 1;
            }
        }

        if stats.total_requests > 0 {
            stats.avg_latency_ms = latency_sum_ms / stats.total_requests as f64;
            stats.error_rate = errors as f64 / stats.total_requests as f64;
        }

        stats
    }

    /// Rolling average latency of recent billable responses for a provider
    ///
    /// Scans the most recent `LATENCY_WINDOW` records; returns `None` when
    /// the provider has no billable samples yet. Read by latency-optimized
    /// candidate ranking.
    pub fn avg_latency_ms(&self, provider: &str) -> Option<f64> {
        let records = self.records.read().unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut sum_ms = 0.0;
        let mut count = 0u32;

        for record in records.iter().rev().take(LATENCY_WINDOW) {
            if record.provider == provider && record.outcome.is_billable() {
                sum_ms += record.latency.as_secs_f64() * 1000.0;
                count += 1;
            }
        }

        (count > 0).then(|| sum_ms / f64::from(count))
    }
}

/// Estimate the cost of a request before it is made
///
/// Pure price-table lookup. The pre-call estimate and the post-call
/// recorded cost may diverge when the token estimate is off; that
/// divergence is expected and visible in the ledger, not an error.
pub fn estimate_cost(pricing: &Pricing, input_tokens: u32, output_tokens: u32) -> f64 {
    let input = f64::from(input_tokens) / 1_000_000.0 * pricing.input_per_mtok;
    let output = f64::from(output_tokens) / 1_000_000.0 * pricing.output_per_mtok;
    input + output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(provider: &str, caller: &str, cost: f64, latency_ms: u64, outcome: Outcome) -> UsageRecord {
        UsageRecord {
            timestamp: SystemTime::now(),
            provider: provider.to_owned(),
            model: "test-model".to_owned(),
            caller: caller.to_owned(),
            input_tokens: 100,
            output_tokens: 50,
            cost_usd: cost,
            estimated_cost_usd: cost,
            latency: Duration::from_millis(latency_ms),
            outcome,
        }
    }

    #[test]
    fn aggregate_totals_are_sums_of_records() {
        let ledger = Ledger::new();
        ledger.record(record("a", "cli", 0.01, 100, Outcome::Success));
        ledger.record(record("a", "cli", 0.02, 200, Outcome::Success));
        ledger.record(record("b", "cli", 0.04, 300, Outcome::Fallback));

        let all = ledger.aggregate(&RecordFilter::default());
        assert_eq!(all.total_requests, 3);
        assert!((all.total_cost_usd - 0.07).abs() < 1e-9);
        assert!((all.avg_latency_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn filter_by_provider() {
        let ledger = Ledger::new();
        ledger.record(record("a", "cli", 0.01, 100, Outcome::Success));
        ledger.record(record("b", "cli", 0.02, 100, Outcome::Success));

        let only_a = ledger.aggregate(&RecordFilter {
            provider: Some("a".to_owned()),
            ..RecordFilter::default()
        });
        assert_eq!(only_a.total_requests, 1);
        assert!((only_a.total_cost_usd - 0.01).abs() < 1e-9);
    }

    #[test]
    fn filter_by_outcome() {
        let ledger = Ledger::new();
        ledger.record(record("a", "cli", 0.01, 100, Outcome::Success));
        ledger.record(record("a", "cli", 0.0, 100, Outcome::Cancelled));

        let cancelled = ledger.aggregate(&RecordFilter {
            outcome: Some(Outcome::Cancelled),
            ..RecordFilter::default()
        });
        assert_eq!(cancelled.total_requests, 1);
        assert!((cancelled.total_cost_usd).abs() < 1e-9);
    }

    #[test]
    fn error_rate_counts_only_errors() {
        let ledger = Ledger::new();
        ledger.record(record("a", "cli", 0.01, 100, Outcome::Success));
        ledger.record(record("a", "cli", 0.0, 100, Outcome::Error));
        ledger.record(record("a", "cli", 0.0, 100, Outcome::Cancelled));
        ledger.record(record("a", "cli", 0.0, 100, Outcome::Error));

        let stats = ledger.aggregate(&RecordFilter::default());
        assert!((stats.error_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rolling_latency_ignores_failures() {
        let ledger = Ledger::new();
        ledger.record(record("a", "cli", 0.01, 100, Outcome::Success));
        ledger.record(record("a", "cli", 0.0, 5000, Outcome::Error));
        ledger.record(record("a", "cli", 0.01, 300, Outcome::Success));

        let avg = ledger.avg_latency_ms("a").unwrap();
        assert!((avg - 200.0).abs() < 1e-9);
    }

    #[test]
    fn no_samples_means_no_latency() {
        let ledger = Ledger::new();
        assert!(ledger.avg_latency_ms("nobody").is_none());
    }

    #[test]
    fn estimate_matches_price_table() {
        let pricing = Pricing {
            input_per_mtok: 3.0,
            output_per_mtok: 15.0,
        };
        let cost = estimate_cost(&pricing, 1_000_000, 100_000);
        assert!((cost - 4.5).abs() < 1e-9);
    }
}
