//! Axum handlers for the client-facing OpenAI-compatible surface
//!
//! The inbound edge reuses the same conversion layer as the OpenAI
//! provider adapter: requests parse into the canonical model, responses
//! re-serialize out of it, and streamed canonical events are re-framed as
//! `OpenAI` SSE chunks as they arrive. No full-response buffering: the SSE
//! writer polls the adapter stream, so a slow client holds back the
//! upstream read. The handlers never retry; fallback belongs to dispatch.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{Stream, StreamExt};
use plexus_core::{HttpError, RequestContext};

use crate::convert;
use crate::dispatch::GatewayState;
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiModel, OpenAiModelList, OpenAiRequest, OpenAiResponse};
use crate::provider::EventStream;
use crate::types::{CompletionRequest, StreamEvent};

/// Build the gateway's API router
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/models", routing::get(list_models))
        .with_state(state)
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(
    State(state): State<GatewayState>,
    axum::Extension(context): axum::Extension<RequestContext>,
    Json(wire_request): Json<OpenAiRequest>,
) -> Response {
    let request: CompletionRequest = wire_request.into();

    if request.stream {
        match state.complete_stream(&request, &context).await {
            Ok((model, stream)) => stream_response(stream, model).into_response(),
            Err(error) => error_response(&error),
        }
    } else {
        match state.complete(&request, &context).await {
            Ok(response) => Json(OpenAiResponse::from(response)).into_response(),
            Err(error) => error_response(&error),
        }
    }
}

/// Handle `GET /v1/models`: configured providers in the list shape
async fn list_models(State(state): State<GatewayState>) -> Response {
    let created = unix_now();

    let data = state
        .provider_listing()
        .into_iter()
        .map(|(name, family, _model)| OpenAiModel {
            id: name,
            object: "model".to_owned(),
            created,
            owned_by: family,
        })
        .collect();

    Json(OpenAiModelList {
        object: "list".to_owned(),
        data,
    })
    .into_response()
}

/// Re-frame canonical events as an `OpenAI` SSE stream
fn stream_response(stream: EventStream, model: String) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let created = unix_now();
    let response_id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());

    let events = stream.map(move |result| match result {
        Ok(StreamEvent::Delta(delta)) => {
            let chunk = convert::openai::delta_to_chunk(&delta, &response_id, &model, created);
            Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()))
        }
        Ok(StreamEvent::Usage(usage)) => {
            let chunk = convert::openai::usage_to_chunk(&usage, &response_id, &model, created);
            Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()))
        }
        Ok(StreamEvent::Done) => Ok(Event::default().data("[DONE]")),
        Err(error) => {
            // Mid-stream failures can only be reported in-band
            let body = serde_json::json!({
                "error": {
                    "message": error.client_message(),
                    "type": error.error_type(),
                }
            });
            Ok(Event::default().data(body.to_string()))
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Render an error as the client dialect's error body
fn error_response(error: &LlmError) -> Response {
    let status = error.status_code();
    if status.is_server_error() {
        tracing::error!(error = %error, "request failed");
    }

    let body = serde_json::json!({
        "error": {
            "message": error.client_message(),
            "type": error.error_type(),
            "code": serde_json::Value::Null,
        }
    });

    (status, Json(body)).into_response()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
