//! Anthropic Messages API provider adapter

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use plexus_config::{CapabilityFlags, ProviderConfig};
use plexus_core::RequestContext;
use reqwest::Client;
use secrecy::SecretString;
use url::Url;

use super::{EventStream, Provider, resolve_api_key, status_error, transport_error};
use crate::convert::anthropic::AnthropicStreamState;
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse, AnthropicStreamEvent};
use crate::sanitize::{ANTHROPIC_DIALECT, sanitize_request};
use crate::types::{CompletionRequest, CompletionResponse};

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages adapter
pub struct AnthropicProvider {
    name: String,
    client: Client,
    base_url: Option<Url>,
    api_key: Option<SecretString>,
    capabilities: CapabilityFlags,
}

impl AnthropicProvider {
    /// Create from provider configuration
    pub fn new(name: String, config: &ProviderConfig) -> Self {
        Self {
            name,
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            capabilities: config.capabilities,
        }
    }

    fn messages_url(&self) -> String {
        let base = self.base_url.as_ref().map_or(DEFAULT_BASE_URL, Url::as_str);
        format!("{}/messages", base.trim_end_matches('/'))
    }

    async fn send(
        &self,
        wire_request: &AnthropicRequest,
        context: &RequestContext,
    ) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .client
            .post(self.messages_url())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(wire_request);

        if let Some(key) = resolve_api_key(self.api_key.as_ref(), context) {
            builder = builder.header("x-api-key", key);
        }

        let response = builder.send().await.map_err(|e| transport_error(&self.name, &e))?;

        if !response.status().is_success() {
            return Err(status_error(&self.name, response).await);
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<CompletionResponse, LlmError> {
        let request = sanitize_request(request, &ANTHROPIC_DIALECT);
        let wire_request: AnthropicRequest = request.as_ref().into();

        let response = self.send(&wire_request, context).await?;

        let wire_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedUpstream(format!("unparseable messages body: {e}")))?;

        Ok(wire_response.into())
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<EventStream, LlmError> {
        let request = sanitize_request(request, &ANTHROPIC_DIALECT);
        let mut wire_request: AnthropicRequest = request.as_ref().into();
        wire_request.stream = Some(true);

        let response = self.send(&wire_request, context).await?;

        // Block events are reassembled through per-response state owned by
        // the closure; it drops with the stream
        let mut state = AnthropicStreamState::new();
        let events = response
            .bytes_stream()
            .eventsource()
            .map(move |result| match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        return vec![];
                    }
                    match serde_json::from_str::<AnthropicStreamEvent>(data) {
                        Ok(stream_event) => state.convert_event(&stream_event).into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(LlmError::MalformedUpstream(format!(
                            "unparseable stream event: {e}"
                        )))],
                    }
                }
                Err(e) => vec![Err(LlmError::Transport(e.to_string()))],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(events))
    }
}
