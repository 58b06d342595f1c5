use http::StatusCode;
use plexus_core::HttpError;
use thiserror::Error;

/// One failed attempt within a fallback chain
///
/// Collected by the dispatcher so a terminal failure can state what was
/// tried and why each candidate failed, instead of surfacing only the last
/// candidate's raw error.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    /// Provider that was tried
    pub provider: String,
    /// Short failure description
    pub reason: String,
}

/// Errors produced by the gateway core
#[derive(Debug, Error)]
pub enum LlmError {
    /// Inbound request failed validation; rejected before any upstream call
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Explicit `provider/model` override named an unconfigured provider
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// The request needs a feature this provider's capabilities exclude
    #[error("provider '{provider}' does not support {feature}")]
    UnsupportedCapability {
        provider: String,
        feature: &'static str,
    },

    /// Upstream payload violated the vendor's own documented shape
    #[error("malformed upstream payload: {0}")]
    MalformedUpstream(String),

    /// Connection-level failure before a status line was received
    #[error("transport error: {0}")]
    Transport(String),

    /// Per-candidate timeout elapsed
    #[error("upstream timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Vendor returned 429
    #[error("upstream rate limited")]
    RateLimited,

    /// Vendor returned a non-success status
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Candidate selection produced no usable provider
    #[error(transparent)]
    Routing(#[from] plexus_routing::RoutingError),

    /// Every candidate in the fallback chain failed
    #[error("all candidates exhausted: {}", format_attempts(.attempts))]
    AllCandidatesExhausted { attempts: Vec<AttemptFailure> },

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Whether this failure should advance the fallback chain
    ///
    /// Capability mismatches also advance (a different vendor may support
    /// the feature) but are never retried against the same candidate.
    pub const fn advances_chain(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedCapability { .. }
                | Self::MalformedUpstream(_)
                | Self::Transport(_)
                | Self::Timeout { .. }
                | Self::RateLimited
                | Self::Upstream { .. }
        )
    }

    /// Whether this failure counts against the provider's health
    ///
    /// Capability mismatches are a static property of the provider, not a
    /// sign of degradation, so they leave the circuit breaker alone.
    pub const fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedUpstream(_)
                | Self::Transport(_)
                | Self::Timeout { .. }
                | Self::RateLimited
                | Self::Upstream { .. }
        )
    }
}

fn format_attempts(attempts: &[AttemptFailure]) -> String {
    if attempts.is_empty() {
        return "no candidates were available".to_owned();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.provider, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnsupportedCapability { .. } => StatusCode::BAD_REQUEST,
            Self::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MalformedUpstream(_) | Self::Transport(_) | Self::Upstream { .. } | Self::AllCandidatesExhausted { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Routing(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::UnsupportedCapability { .. } => "unsupported_capability_error",
            Self::ProviderNotFound { .. } => "not_found_error",
            Self::MalformedUpstream(_) | Self::Transport(_) | Self::Upstream { .. } => "upstream_error",
            Self::Timeout { .. } => "timeout_error",
            Self::RateLimited => "rate_limit_error",
            Self::Routing(_) => "routing_error",
            Self::AllCandidatesExhausted { .. } => "all_candidates_exhausted",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_message_names_every_attempt() {
        let err = LlmError::AllCandidatesExhausted {
            attempts: vec![
                AttemptFailure {
                    provider: "fast".to_owned(),
                    reason: "upstream timed out after 30s".to_owned(),
                },
                AttemptFailure {
                    provider: "backup".to_owned(),
                    reason: "upstream rate limited".to_owned(),
                },
            ],
        };
        let message = err.client_message();
        assert!(message.contains("fast"));
        assert!(message.contains("backup"));
        assert!(message.contains("rate limited"));
    }

    #[test]
    fn capability_mismatch_advances_but_is_not_a_failure() {
        let err = LlmError::UnsupportedCapability {
            provider: "basic".to_owned(),
            feature: "tool_calling",
        };
        assert!(err.advances_chain());
        assert!(!err.is_provider_failure());
    }

    #[test]
    fn validation_never_advances() {
        let err = LlmError::InvalidRequest("empty messages".to_owned());
        assert!(!err.advances_chain());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
