use serde::{Deserialize, Serialize};

use super::message::ToolCall;

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
}

/// Token usage reported by the vendor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// A single completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice
    pub index: u32,
    /// Generated message
    pub message: ChoiceMessage,
    /// Why generation stopped
    pub finish_reason: Option<FinishReason>,
}

/// Assistant output within a response choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// Always "assistant" for completions
    pub role: String,
    /// Text content
    pub content: Option<String>,
    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChoiceMessage {
    /// Assemble from collected text and tool calls
    ///
    /// Used by response conversions: empty text with tool calls present
    /// serializes as `content: null`, matching the client dialect.
    pub fn from_parts(text: String, tool_calls: Vec<ToolCall>) -> Self {
        if tool_calls.is_empty() {
            Self {
                role: "assistant".to_owned(),
                content: Some(text),
                tool_calls: None,
            }
        } else {
            Self {
                role: "assistant".to_owned(),
                content: (!text.is_empty()).then_some(text),
                tool_calls: Some(tool_calls),
            }
        }
    }
}

/// Canonical completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Response identifier
    pub id: String,
    /// Object type ("chat.completion")
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model that generated the response
    pub model: String,
    /// Generated choices
    pub choices: Vec<Choice>,
    /// Token usage, absent when the vendor reported none
    pub usage: Option<Usage>,
}
