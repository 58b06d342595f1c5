//! OpenAI-compatible provider adapter

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use plexus_config::{CapabilityFlags, ProviderConfig};
use plexus_core::RequestContext;
use reqwest::Client;
use secrecy::SecretString;
use url::Url;

use super::{EventStream, Provider, resolve_api_key, status_error, transport_error};
use crate::convert::openai::chunk_to_events;
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions};
use crate::sanitize::{OPENAI_DIALECT, sanitize_request};
use crate::types::{CompletionRequest, CompletionResponse, StreamEvent};

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions adapter
///
/// Also covers third-party OpenAI-compatible endpoints via `base_url`.
pub struct OpenAiProvider {
    name: String,
    client: Client,
    base_url: Option<Url>,
    api_key: Option<SecretString>,
    capabilities: CapabilityFlags,
}

impl OpenAiProvider {
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

    fn completions_url(&self) -> String {
        let base = self.base_url.as_ref().map_or(DEFAULT_BASE_URL, Url::as_str);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    /// Whether the canonical OpenAI API is the target
    ///
    /// Compatible third-party endpoints often reject `stream_options`.
    fn is_canonical(&self) -> bool {
        self.base_url
            .as_ref()
            .is_none_or(|u| u.host_str() == Some("api.openai.com"))
    }

    async fn send(
        &self,
        wire_request: &OpenAiRequest,
        context: &RequestContext,
    ) -> Result<reqwest::Response, LlmError> {
        let mut builder = self.client.post(self.completions_url()).json(wire_request);

        if let Some(key) = resolve_api_key(self.api_key.as_ref(), context) {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| transport_error(&self.name, &e))?;

        if !response.status().is_success() {
            return Err(status_error(&self.name, response).await);
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
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
        let request = sanitize_request(request, &OPENAI_DIALECT);
        let wire_request: OpenAiRequest = request.as_ref().into();

        let response = self.send(&wire_request, context).await?;

        let wire_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedUpstream(format!("unparseable completion body: {e}")))?;

        Ok(wire_response.into())
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<EventStream, LlmError> {
        let request = sanitize_request(request, &OPENAI_DIALECT);
        let mut wire_request: OpenAiRequest = request.as_ref().into();
        wire_request.stream = Some(true);
        wire_request.stream_options = self
            .is_canonical()
            .then_some(OpenAiStreamOptions { include_usage: true });

        let response = self.send(&wire_request, context).await?;

        let events = response
            .bytes_stream()
            .eventsource()
            .map(|result| match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data == "[DONE]" {
                        return vec![Ok(StreamEvent::Done)];
                    }
                    if data.is_empty() {
                        return vec![];
                    }
                    match serde_json::from_str::<OpenAiStreamChunk>(data) {
                        Ok(chunk) => chunk_to_events(&chunk).into_iter().map(Ok).collect(),
                        Err(e) => vec![Err(LlmError::MalformedUpstream(format!(
                            "unparseable stream chunk: {e}"
                        )))],
                    }
                }
                Err(e) => vec![Err(LlmError::Transport(e.to_string()))],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(events))
    }
}
