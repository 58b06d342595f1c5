//! Protocol-translating gateway core for Plexus
//!
//! Normalizes heterogeneous LLM vendor protocols (OpenAI-compatible,
//! Anthropic Messages, Google Generative Language) into one canonical
//! request/response model, repairs tool-schema incompatibilities per vendor
//! dialect, re-frames streaming output, and executes routed requests with
//! automatic fallback across configured providers.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod api;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod protocol;
pub mod provider;
pub mod sanitize;
pub mod types;

pub use api::gateway_router;
pub use dispatch::GatewayState;
pub use error::LlmError;
pub use provider::{EventStream, Provider};
pub use types::{CompletionRequest, CompletionResponse, StreamEvent};
