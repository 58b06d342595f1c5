//! Mock upstream provider for integration tests
//!
//! A minimal OpenAI-compatible backend with scriptable failure behavior
//! and canned streaming output.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

/// A running mock upstream
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    completion_count: AtomicU32,
    /// Requests to fail with the given status before succeeding
    fail_count: AtomicU32,
    fail_status: StatusCode,
    response_content: String,
    last_request: Mutex<Option<serde_json::Value>>,
}

impl MockProvider {
    /// Start a mock that always succeeds
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(0, StatusCode::INTERNAL_SERVER_ERROR, "Hello from mock").await
    }

    /// Start a mock that fails the first `n` requests with 500
    pub async fn start_failing(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(n, StatusCode::INTERNAL_SERVER_ERROR, "Hello from mock").await
    }

    /// Start a mock that rate-limits the first `n` requests with 429
    pub async fn start_rate_limited(n: u32) -> anyhow::Result<Self> {
        Self::start_inner(n, StatusCode::TOO_MANY_REQUESTS, "Hello from mock").await
    }

    /// Start a mock with custom response content
    pub async fn start_with_response(content: &str) -> anyhow::Result<Self> {
        Self::start_inner(0, StatusCode::INTERNAL_SERVER_ERROR, content).await
    }

    async fn start_inner(fail_count: u32, fail_status: StatusCode, content: &str) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            completion_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
            fail_status,
            response_content: content.to_owned(),
            last_request: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_task = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_task.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring this mock as a provider
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of completion requests received
    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    /// The most recent request body, for wire-shape assertions
    pub fn last_request(&self) -> Option<serde_json::Value> {
        self.state.last_request.lock().unwrap().clone()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_completions(
    State(state): State<Arc<MockState>>,
    Json(request): Json<serde_json::Value>,
) -> axum::response::Response {
    state.completion_count.fetch_add(1, Ordering::Relaxed);
    *state.last_request.lock().unwrap() = Some(request.clone());

    let remaining = state.fail_count.load(Ordering::Relaxed);
    if remaining > 0 {
        state.fail_count.fetch_sub(1, Ordering::Relaxed);
        return (
            state.fail_status,
            Json(serde_json::json!({
                "error": {"message": "mock upstream failure", "type": "server_error"}
            })),
        )
            .into_response();
    }

    let model = request["model"].as_str().unwrap_or("mock-model-1").to_owned();
    let has_tools = request["tools"].is_array();

    if request["stream"].as_bool().unwrap_or(false) {
        return streaming_body(&state.response_content, &model, has_tools).into_response();
    }

    let message = if has_tools {
        serde_json::json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_mock_1",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}
            }]
        })
    } else {
        serde_json::json!({"role": "assistant", "content": state.response_content})
    };

    Json(serde_json::json!({
        "id": "chatcmpl-mock-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": if has_tools { "tool_calls" } else { "stop" }
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
    .into_response()
}

/// Canned SSE body: per-word content chunks (or a tool call), usage, [DONE]
fn streaming_body(content: &str, model: &str, has_tools: bool) -> impl IntoResponse {
    let mut body = String::new();
    let mut push = |value: serde_json::Value| {
        body.push_str(&format!("data: {value}\n\n"));
    };

    let chunk = |delta: serde_json::Value, finish: Option<&str>| {
        serde_json::json!({
            "id": "chatcmpl-mock-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish}]
        })
    };

    if has_tools {
        push(chunk(
            serde_json::json!({
                "role": "assistant",
                "tool_calls": [{
                    "index": 0,
                    "id": "call_mock_stream",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": null}
                }]
            }),
            None,
        ));
        push(chunk(
            serde_json::json!({
                "tool_calls": [{
                    "index": 0,
                    "function": {"arguments": "{\"location\":\"Paris\"}"}
                }]
            }),
            None,
        ));
        push(chunk(serde_json::json!({}), Some("tool_calls")));
    } else {
        push(chunk(serde_json::json!({"role": "assistant", "content": ""}), None));
        for word in content.split_whitespace() {
            push(chunk(serde_json::json!({"content": format!("{word} ")}), None));
        }
        push(chunk(serde_json::json!({}), Some("stop")));
    }

    push(serde_json::json!({
        "id": "chatcmpl-mock-stream",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": model,
        "choices": [],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }));

    body.push_str("data: [DONE]\n\n");

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
        body,
    )
}
