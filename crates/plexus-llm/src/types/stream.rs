use serde::{Deserialize, Serialize};

use super::response::{FinishReason, Usage};

/// Canonical streaming event
///
/// Every vendor framing is re-emitted as this sequence: zero or more
/// deltas, an optional usage event, and exactly one terminal `Done`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Incremental content
    Delta(StreamDelta),
    /// Final usage statistics
    Usage(Usage),
    /// Stream completed; terminal, exactly once per response
    Done,
}

/// Incremental update within a streaming response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Choice index this delta belongs to
    pub index: u32,
    /// Incremental text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental tool call data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<StreamToolCall>,
    /// Present on the final delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    /// A pure text delta for choice 0
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            index: 0,
            content: Some(content.into()),
            tool_call: None,
            finish_reason: None,
        }
    }

    /// A delta carrying only a finish reason
    pub const fn finished(index: u32, reason: FinishReason) -> Self {
        Self {
            index,
            content: None,
            tool_call: None,
            finish_reason: Some(reason),
        }
    }
}

/// Partial tool call within a stream delta
///
/// `index` is the sequential position of the call in the response's
/// `tool_calls` array and stays stable across the fragments of one call;
/// `id` and the function name appear on the first fragment only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamToolCall {
    /// Position in the `tool_calls` array
    pub index: u32,
    /// Call id, first fragment only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Partial function data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<StreamFunctionCall>,
}

/// Partial function data within a streaming tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFunctionCall {
    /// Function name, first fragment only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Incremental JSON arguments fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}
