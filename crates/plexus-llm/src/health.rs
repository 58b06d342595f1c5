//! Provider health tracking
//!
//! Three-state circuit breaker over configured providers. Consecutive
//! retryable failures inside a sliding window first demote a provider to
//! `Degraded` (still eligible, ranked last), then to `Unavailable`
//! (excluded from selection). After the probe interval an unavailable
//! provider admits traffic again in `Degraded` position; the first failure
//! re-opens the wait, a success resets it to `Healthy`.
//!
//! This tracker is the only writer of health state. Reads are lock-free
//! and eventually consistent; candidate selection never holds a lock
//! across an upstream call.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use plexus_config::HealthConfig;
use plexus_routing::HealthState;

/// Per-provider failure accounting
struct ProviderHealth {
    /// Consecutive retryable failures in the current window
    failures: AtomicU32,
    /// Start of the failure window (unix seconds)
    window_start: AtomicU64,
    /// When the provider became unavailable (unix seconds, 0 = it is not)
    unavailable_since: AtomicU64,
}

impl ProviderHealth {
    fn new() -> Self {
        Self {
            failures: AtomicU32::new(0),
            window_start: AtomicU64::new(now_secs()),
            unavailable_since: AtomicU64::new(0),
        }
    }
}

/// Tracks health state for all configured providers
pub struct HealthTracker {
    providers: DashMap<String, ProviderHealth>,
    config: HealthConfig,
}

impl HealthTracker {
    /// Create a tracker with the configured thresholds
    pub fn new(config: HealthConfig) -> Self {
        Self {
            providers: DashMap::new(),
            config,
        }
    }

    /// Current state of a provider
    ///
    /// Providers with no recorded traffic are healthy.
    pub fn state(&self, provider: &str) -> HealthState {
        let Some(health) = self.providers.get(provider) else {
            return HealthState::Healthy;
        };

        let unavailable_since = health.unavailable_since.load(Ordering::Relaxed);
        if unavailable_since != 0 {
            let elapsed = now_secs().saturating_sub(unavailable_since);
            return if elapsed >= self.config.probe_seconds {
                // Probe window: eligible again, but ranked after healthy
                HealthState::Degraded
            } else {
                HealthState::Unavailable
            };
        }

        if self.window_failures(&health) >= self.config.degraded_threshold {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        }
    }

    /// Record a successful request; resets the provider to healthy
    pub fn record_success(&self, provider: &str) {
        let Some(health) = self.providers.get(provider) else {
            return;
        };

        let was_unavailable = health.unavailable_since.swap(0, Ordering::Relaxed) != 0;
        let had_failures = health.failures.swap(0, Ordering::Relaxed) > 0;
        health.window_start.store(now_secs(), Ordering::Relaxed);
        drop(health);

        if was_unavailable || had_failures {
            tracing::info!(provider, "provider recovered, back to healthy");
        }
    }

    /// Record a retryable failure
    pub fn record_failure(&self, provider: &str) {
        let health = self
            .providers
            .entry(provider.to_owned())
            .or_insert_with(ProviderHealth::new);

        let now = now_secs();

        // A failure while unavailable (including during the probe window)
        // restarts the wait
        if health.unavailable_since.load(Ordering::Relaxed) != 0 {
            health.unavailable_since.store(now, Ordering::Relaxed);
            return;
        }

        let window_start = health.window_start.load(Ordering::Relaxed);
        let count = if now.saturating_sub(window_start) >= self.config.window_seconds {
            health.failures.store(1, Ordering::Relaxed);
            health.window_start.store(now, Ordering::Relaxed);
            1
        } else {
            health.failures.fetch_add(1, Ordering::Relaxed) + 1
        };

        if count >= self.config.unavailable_threshold {
            health.unavailable_since.store(now, Ordering::Relaxed);
            drop(health);
            tracing::warn!(provider, failures = count, "provider marked unavailable");
        } else if count == self.config.degraded_threshold {
            drop(health);
            tracing::warn!(provider, failures = count, "provider degraded");
        }
    }

    fn window_failures(&self, health: &ProviderHealth) -> u32 {
        let window_start = health.window_start.load(Ordering::Relaxed);
        if now_secs().saturating_sub(window_start) >= self.config.window_seconds {
            0
        } else {
            health.failures.load(Ordering::Relaxed)
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
