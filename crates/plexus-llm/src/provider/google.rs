//! Google Generative Language API provider adapter

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use plexus_config::{CapabilityFlags, ProviderConfig};
use plexus_core::RequestContext;
use reqwest::Client;
use secrecy::SecretString;
use url::Url;

use super::{EventStream, Provider, resolve_api_key, status_error, transport_error};
use crate::convert::google::{GoogleStreamState, response_to_completion};
use crate::error::LlmError;
use crate::protocol::google::{GoogleRequest, GoogleResponse};
use crate::sanitize::{GOOGLE_DIALECT, sanitize_request};
use crate::types::{CompletionRequest, CompletionResponse};

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Generative Language adapter
///
/// The API keys requests by model in the URL path and authenticates via
/// the `x-goog-api-key` header.
pub struct GoogleProvider {
    name: String,
    client: Client,
    base_url: Option<Url>,
    api_key: Option<SecretString>,
    capabilities: CapabilityFlags,
}

impl GoogleProvider {
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

    fn endpoint_url(&self, model: &str, method: &str) -> String {
        let base = self.base_url.as_ref().map_or(DEFAULT_BASE_URL, Url::as_str);
        format!("{}/models/{model}:{method}", base.trim_end_matches('/'))
    }

    async fn send(
        &self,
        url: String,
        wire_request: &GoogleRequest,
        context: &RequestContext,
    ) -> Result<reqwest::Response, LlmError> {
        let mut builder = self.client.post(url).json(wire_request);

        if let Some(key) = resolve_api_key(self.api_key.as_ref(), context) {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = builder.send().await.map_err(|e| transport_error(&self.name, &e))?;

        if !response.status().is_success() {
            return Err(status_error(&self.name, response).await);
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for GoogleProvider {
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
        let request = sanitize_request(request, &GOOGLE_DIALECT);
        let wire_request: GoogleRequest = request.as_ref().into();

        let url = self.endpoint_url(&request.model, "generateContent");
        let response = self.send(url, &wire_request, context).await?;

        let wire_response: GoogleResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedUpstream(format!("unparseable generateContent body: {e}")))?;

        Ok(response_to_completion(&wire_response, &request.model))
    }

    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        context: &RequestContext,
    ) -> Result<EventStream, LlmError> {
        let request = sanitize_request(request, &GOOGLE_DIALECT);
        let wire_request: GoogleRequest = request.as_ref().into();

        let url = self.endpoint_url(&request.model, "streamGenerateContent?alt=sse");
        let response = self.send(url, &wire_request, context).await?;

        // Chunks re-use the whole-response shape; per-response state mints
        // call ids and emits the terminal event
        let mut state = GoogleStreamState::new();
        let events = response
            .bytes_stream()
            .eventsource()
            .map(move |result| match result {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        return vec![];
                    }
                    match serde_json::from_str::<GoogleResponse>(data) {
                        Ok(chunk) => state.convert_chunk(&chunk).into_iter().map(Ok).collect(),
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
