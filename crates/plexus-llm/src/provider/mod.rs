//! Provider trait and per-family HTTP adapters
//!
//! One implementation per vendor protocol family, built from configuration
//! at a single dispatch point (`build`). The dispatch layer stays
//! vendor-agnostic: it sees only the trait.

pub mod anthropic;
pub mod google;
pub mod openai;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use plexus_config::{CapabilityFlags, ProviderConfig, ProviderFamily};
use plexus_core::RequestContext;
use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Stream of canonical events from one upstream response
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Trait implemented by each vendor family adapter
///
/// Adapters translate canonical requests to the vendor wire shape (running
/// every tool schema through the family's dialect sanitizer), issue the
/// HTTP call, and translate the response or stream back. They never retry;
/// failures are reported to the dispatcher, which owns the fallback chain.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Configured provider name
    fn name(&self) -> &str;

    /// Capability flags from configuration
    fn capabilities(&self) -> CapabilityFlags;

    /// Send a non-streaming completion request
    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<CompletionResponse, LlmError>;

    /// Send a streaming completion request
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<EventStream, LlmError>;
}

/// Construct the adapter for a configured provider
///
/// The single point where a vendor family maps to an implementation.
pub fn build(name: &str, config: &ProviderConfig) -> Arc<dyn Provider> {
    match config.family {
        ProviderFamily::Openai => Arc::new(openai::OpenAiProvider::new(name.to_owned(), config)),
        ProviderFamily::Anthropic => Arc::new(anthropic::AnthropicProvider::new(name.to_owned(), config)),
        ProviderFamily::Google => Arc::new(google::GoogleProvider::new(name.to_owned(), config)),
    }
}

/// Longest upstream error body carried into an error message
const MAX_ERROR_BODY: usize = 512;

/// Resolve the key to send upstream: caller-supplied key wins
pub(crate) fn resolve_api_key(configured: Option<&SecretString>, context: &RequestContext) -> Option<String> {
    context
        .api_key
        .as_ref()
        .or(configured)
        .map(|k| k.expose_secret().to_owned())
}

/// Map a reqwest send error to the transport failure class
pub(crate) fn transport_error(provider: &str, error: &reqwest::Error) -> LlmError {
    tracing::warn!(provider, error = %error, "upstream transport failure");
    LlmError::Transport(error.to_string())
}

/// Classify a non-success upstream status
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(MAX_ERROR_BODY).collect();

    tracing::warn!(provider, status = %status, "upstream returned error status");

    if status.as_u16() == 429 {
        LlmError::RateLimited
    } else {
        LlmError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}
