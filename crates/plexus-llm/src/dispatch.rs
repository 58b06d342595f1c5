//! Request dispatch: candidate selection, fallback execution, accounting
//!
//! The per-request state machine: select an ordered candidate chain,
//! invoke candidates under a per-candidate timeout, advance the chain on
//! retryable failure, and report `AllCandidatesExhausted` when it runs dry.
//! Every attempt lands in the ledger; the health tracker sees every
//! provider success and failure. Candidates come only from configuration
//! (a matched rule, an explicit override, or the ranked provider table),
//! never from a compiled-in list.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant, SystemTime};

use futures_util::Stream;
use plexus_config::{Config, Pricing, RoutingMode};
use plexus_core::RequestContext;
use plexus_ledger::{Ledger, Outcome, UsageRecord, estimate_cost};
use plexus_routing::{
    CandidateState, HealthState, ProviderTable, RequestProfile, Requirements, RouteRule, RoutingError, first_match,
    rank_by_cost, rank_by_latency,
};

use crate::error::{AttemptFailure, LlmError};
use crate::health::HealthTracker;
use crate::provider::{EventStream, Provider};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent, TokenEstimate, Usage};

/// One entry in a fallback chain: a provider and the model to request
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    provider: String,
    model: String,
}

/// Shared gateway state: adapters, routing tables, health, ledger
///
/// Built once at startup from configuration and cloned (cheaply) into
/// request handlers. Request handling never mutates anything here except
/// through the ledger's append and the health tracker's transitions.
#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<Inner>,
}

struct Inner {
    providers: HashMap<String, Arc<dyn Provider>>,
    table: ProviderTable,
    rules: Vec<RouteRule>,
    mode: RoutingMode,
    timeout: Duration,
    health: HealthTracker,
    ledger: Arc<Ledger>,
}

impl GatewayState {
    /// Build the gateway from configuration, constructing all adapters
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is internally inconsistent.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let providers = config
            .providers
            .iter()
            .map(|(name, provider_config)| (name.clone(), crate::provider::build(name, provider_config)))
            .collect();

        Ok(Self::assemble(providers, config))
    }

    /// Assemble from pre-built adapters; also the injection point for tests
    pub fn assemble(providers: HashMap<String, Arc<dyn Provider>>, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                providers,
                table: ProviderTable::from_config(&config.providers),
                rules: config.routing.rules.iter().map(RouteRule::from_config).collect(),
                mode: config.routing.mode,
                timeout: Duration::from_secs(config.routing.request_timeout_secs),
                health: HealthTracker::new(config.routing.health.clone()),
                ledger: Arc::new(Ledger::new()),
            }),
        }
    }

    /// The usage ledger, for aggregate consumers
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.inner.ledger
    }

    /// Providers in declaration order, for model listing
    pub fn provider_listing(&self) -> Vec<(String, String, String)> {
        self.inner
            .table
            .profiles()
            .iter()
            .map(|p| (p.name.clone(), p.family.as_str().to_owned(), p.model.clone()))
            .collect()
    }

    /// Execute a non-streaming completion through the fallback chain
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<CompletionResponse, LlmError> {
        request.validate()?;
        let estimate = request.estimate_tokens();
        let candidates = self.select_candidates(request, context, estimate)?;

        let mut attempts: Vec<AttemptFailure> = Vec::new();

        for candidate in &candidates {
            let Some(provider) = self.inner.providers.get(&candidate.provider) else {
                continue;
            };

            let accounting = self.accounting(candidate, context, estimate);

            if let Err(error) = self.check_capabilities(candidate, request, estimate) {
                accounting.record_failure(Instant::now());
                attempts.push(AttemptFailure {
                    provider: candidate.provider.clone(),
                    reason: error.to_string(),
                });
                continue;
            }

            let mut attempt_request = request.clone();
            attempt_request.model.clone_from(&candidate.model);

            let started = Instant::now();
            let outcome = match tokio::time::timeout(self.inner.timeout, provider.complete(&attempt_request, context))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout {
                    seconds: self.inner.timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(response) => {
                    self.inner.health.record_success(&candidate.provider);
                    let usage = response.usage.clone().unwrap_or_default();
                    accounting.record_completed(started, &usage, fallback_outcome(&attempts));
                    return Ok(response);
                }
                Err(error) if error.advances_chain() => {
                    if error.is_provider_failure() {
                        self.inner.health.record_failure(&candidate.provider);
                    }
                    accounting.record_failure(started);
                    tracing::warn!(
                        provider = %candidate.provider,
                        error = %error,
                        "candidate failed, advancing fallback chain"
                    );
                    attempts.push(AttemptFailure {
                        provider: candidate.provider.clone(),
                        reason: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }

        Err(LlmError::AllCandidatesExhausted { attempts })
    }

    /// Execute a streaming completion through the fallback chain
    ///
    /// Fallback is only possible before the stream is established; once a
    /// candidate starts producing events, its outcome (success, error, or
    /// client cancellation) is recorded by the returned stream's guard.
    /// Returns the model actually invoked alongside the event stream.
    pub async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<(String, EventStream), LlmError> {
        request.validate()?;
        let estimate = request.estimate_tokens();
        let candidates = self.select_candidates(request, context, estimate)?;

        let mut attempts: Vec<AttemptFailure> = Vec::new();

        for candidate in &candidates {
            let Some(provider) = self.inner.providers.get(&candidate.provider) else {
                continue;
            };

            let accounting = self.accounting(candidate, context, estimate);

            if let Err(error) = self.check_capabilities(candidate, request, estimate) {
                accounting.record_failure(Instant::now());
                attempts.push(AttemptFailure {
                    provider: candidate.provider.clone(),
                    reason: error.to_string(),
                });
                continue;
            }

            let mut attempt_request = request.clone();
            attempt_request.model.clone_from(&candidate.model);

            let started = Instant::now();
            let outcome = match tokio::time::timeout(
                self.inner.timeout,
                provider.complete_stream(&attempt_request, context),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout {
                    seconds: self.inner.timeout.as_secs(),
                }),
            };

            match outcome {
                Ok(stream) => {
                    self.inner.health.record_success(&candidate.provider);
                    let recorded = RecordedStream {
                        inner: stream,
                        usage: Usage::default(),
                        guard: Some(StreamGuard {
                            shared: Arc::clone(&self.inner),
                            accounting,
                            started,
                            success_outcome: fallback_outcome(&attempts),
                        }),
                    };
                    return Ok((candidate.model.clone(), Box::pin(recorded)));
                }
                Err(error) if error.advances_chain() => {
                    if error.is_provider_failure() {
                        self.inner.health.record_failure(&candidate.provider);
                    }
                    accounting.record_failure(started);
                    tracing::warn!(
                        provider = %candidate.provider,
                        error = %error,
                        "streaming candidate failed, advancing fallback chain"
                    );
                    attempts.push(AttemptFailure {
                        provider: candidate.provider.clone(),
                        reason: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }

        Err(LlmError::AllCandidatesExhausted { attempts })
    }

    /// Produce the ordered fallback chain for this request
    ///
    /// An explicit `provider/model` override or bare provider name skips
    /// selection entirely; otherwise the configured routing mode decides.
    fn select_candidates(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
        estimate: TokenEstimate,
    ) -> Result<Vec<Candidate>, LlmError> {
        // Explicit provider/model override
        if let Some((provider, model)) = request.model.split_once('/') {
            if self.inner.providers.contains_key(provider) {
                return Ok(vec![Candidate {
                    provider: provider.to_owned(),
                    model: model.to_owned(),
                }]);
            }
            return Err(LlmError::ProviderNotFound {
                provider: provider.to_owned(),
            });
        }

        // Bare provider name selects that provider with its bound model
        if let Some(profile) = self.inner.table.get(&request.model) {
            return Ok(vec![Candidate {
                provider: profile.name.clone(),
                model: profile.model.clone(),
            }]);
        }

        let requires = Requirements {
            tool_calling: request.uses_tools(),
            streaming: request.stream,
            input_tokens: estimate.input_tokens,
        };

        match self.inner.mode {
            RoutingMode::Rules => {
                let profile = RequestProfile {
                    caller: context.caller.name.clone(),
                    privacy: context.caller.privacy.clone(),
                    estimated_input_tokens: estimate.input_tokens,
                    has_tools: request.uses_tools(),
                };

                let rule = first_match(&self.inner.rules, &profile).ok_or(RoutingError::NoRuleMatched {
                    caller: profile.caller.clone(),
                })?;

                // The rule's chain is the fallback order; unavailable
                // providers are excluded, everything else keeps its place
                let chain: Vec<Candidate> = rule
                    .candidates
                    .iter()
                    .filter(|name| self.inner.health.state(name) != HealthState::Unavailable)
                    .filter_map(|name| self.inner.table.get(name))
                    .map(|p| Candidate {
                        provider: p.name.clone(),
                        model: p.model.clone(),
                    })
                    .collect();

                if chain.is_empty() {
                    return Err(RoutingError::NoCandidates.into());
                }
                Ok(chain)
            }
            RoutingMode::Cost | RoutingMode::Latency => {
                let states: Vec<CandidateState<'_>> = self
                    .inner
                    .table
                    .profiles()
                    .iter()
                    .map(|profile| CandidateState {
                        profile,
                        health: self.inner.health.state(&profile.name),
                        avg_latency_ms: self.inner.ledger.avg_latency_ms(&profile.name),
                    })
                    .collect();

                let ranked = match self.inner.mode {
                    RoutingMode::Cost => {
                        rank_by_cost(&states, requires, estimate.input_tokens, estimate.output_tokens)?
                    }
                    _ => rank_by_latency(&states, requires)?,
                };

                Ok(ranked
                    .into_iter()
                    .filter_map(|name| self.inner.table.get(&name))
                    .map(|p| Candidate {
                        provider: p.name.clone(),
                        model: p.model.clone(),
                    })
                    .collect())
            }
        }
    }

    /// Reject a candidate whose capabilities cannot express the request
    fn check_capabilities(
        &self,
        candidate: &Candidate,
        request: &CompletionRequest,
        estimate: TokenEstimate,
    ) -> Result<(), LlmError> {
        let Some(profile) = self.inner.table.get(&candidate.provider) else {
            return Ok(());
        };
        let caps = &profile.capabilities;

        if request.uses_tools() && !caps.tool_calling {
            return Err(LlmError::UnsupportedCapability {
                provider: candidate.provider.clone(),
                feature: "tool calling",
            });
        }
        if request.stream && !caps.streaming {
            return Err(LlmError::UnsupportedCapability {
                provider: candidate.provider.clone(),
                feature: "streaming",
            });
        }
        if estimate.input_tokens > caps.max_context_tokens {
            return Err(LlmError::UnsupportedCapability {
                provider: candidate.provider.clone(),
                feature: "a context window this large",
            });
        }
        Ok(())
    }

    fn accounting(&self, candidate: &Candidate, context: &RequestContext, estimate: TokenEstimate) -> Accounting {
        let pricing = self
            .inner
            .table
            .get(&candidate.provider)
            .map(|p| p.pricing)
            .unwrap_or_default();

        Accounting {
            ledger: Arc::clone(&self.inner.ledger),
            provider: candidate.provider.clone(),
            model: candidate.model.clone(),
            caller: context.caller.name.clone(),
            pricing,
            estimated_cost_usd: estimate_cost(&pricing, estimate.input_tokens, estimate.output_tokens),
        }
    }
}

const fn fallback_outcome(attempts: &[AttemptFailure]) -> Outcome {
    if attempts.is_empty() { Outcome::Success } else { Outcome::Fallback }
}

/// Ledger bookkeeping for one attempt against one candidate
struct Accounting {
    ledger: Arc<Ledger>,
    provider: String,
    model: String,
    caller: String,
    pricing: Pricing,
    estimated_cost_usd: f64,
}

impl Accounting {
    fn record(&self, started: Instant, usage: &Usage, outcome: Outcome) {
        let cost_usd = if outcome.is_billable() {
            estimate_cost(&self.pricing, usage.prompt_tokens, usage.completion_tokens)
        } else {
            0.0
        };

        self.ledger.record(UsageRecord {
            timestamp: SystemTime::now(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            caller: self.caller.clone(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            cost_usd,
            estimated_cost_usd: self.estimated_cost_usd,
            latency: started.elapsed(),
            outcome,
        });
    }

    fn record_completed(&self, started: Instant, usage: &Usage, outcome: Outcome) {
        self.record(started, usage, outcome);
    }

    fn record_failure(&self, started: Instant) {
        self.record(started, &Usage::default(), Outcome::Error);
    }
}

/// Event stream wrapper that makes stream outcomes observable
///
/// Passes events through while accumulating usage. The terminal `Done`
/// records a billable success; an error event records a failed attempt;
/// dropping the stream before any terminal state (the client went away)
/// records `Cancelled` so an abandoned response is never billed as
/// success. The guard fires exactly once.
struct RecordedStream {
    inner: EventStream,
    usage: Usage,
    guard: Option<StreamGuard>,
}

struct StreamGuard {
    shared: Arc<Inner>,
    accounting: Accounting,
    started: Instant,
    success_outcome: Outcome,
}

impl StreamGuard {
    fn finalize(self, usage: &Usage, outcome: Outcome) {
        if outcome == Outcome::Error {
            self.shared.health.record_failure(&self.accounting.provider);
        }
        self.accounting.record(self.started, usage, outcome);
    }
}

impl Stream for RecordedStream {
    type Item = Result<StreamEvent, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let polled = Pin::new(&mut this.inner).poll_next(cx);
        match &polled {
            Poll::Ready(Some(Ok(event))) => match event {
                StreamEvent::Usage(usage) => this.usage = usage.clone(),
                StreamEvent::Done => {
                    if let Some(guard) = this.guard.take() {
                        let outcome = guard.success_outcome;
                        guard.finalize(&this.usage, outcome);
                    }
                }
                StreamEvent::Delta(_) => {}
            },
            Poll::Ready(Some(Err(error))) => {
                tracing::warn!(error = %error, "stream failed mid-response");
                if let Some(guard) = this.guard.take() {
                    guard.finalize(&Usage::default(), Outcome::Error);
                }
            }
            Poll::Ready(None) => {
                // Upstream closed without a terminal event: a truncated
                // response, not a client cancellation
                if let Some(guard) = this.guard.take() {
                    guard.finalize(&Usage::default(), Outcome::Error);
                }
            }
            Poll::Pending => {}
        }

        polled
    }
}

impl Drop for RecordedStream {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            tracing::debug!(provider = %guard.accounting.provider, "stream dropped before completion");
            guard.finalize(&self.usage, Outcome::Cancelled);
        }
    }
}
