use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::message::{Message, Role};
use super::tool::{ToolChoice, ToolDefinition};
use crate::error::LlmError;

/// Heuristic chars-per-token divisor for length-based estimation
const CHARS_PER_TOKEN: usize = 4;

/// Fixed per-message framing overhead in tokens
const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Assumed completion length when the request sets no `max_tokens`
const DEFAULT_OUTPUT_TOKENS: u32 = 512;

/// Parameters controlling text generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Random seed for deterministic generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Canonical completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model selector: a configured provider name, `provider/model`
    /// override, or an ordinary model name resolved by routing
    pub model: String,
    /// Ordered conversation messages
    pub messages: Vec<Message>,
    /// Generation parameters
    #[serde(default)]
    pub params: CompletionParams,
    /// Tool definitions available to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// How the model should select tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

/// Heuristic pre-routing token estimate
///
/// Length-based, never vendor-exact; feeds cost prediction and context
/// window checks before a provider is chosen. Divergence from the usage a
/// vendor later reports is expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenEstimate {
    /// Estimated prompt tokens
    pub input_tokens: u32,
    /// Expected completion tokens
    pub output_tokens: u32,
}

impl CompletionRequest {
    /// Whether the request defines any tools
    pub fn uses_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// Validate structural invariants before any upstream call
    ///
    /// Checks a non-empty message sequence, unique tool names, and that
    /// every Tool-role message references a call id emitted by a prior
    /// assistant message.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` describing the first violation.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.messages.is_empty() {
            return Err(LlmError::InvalidRequest("messages must not be empty".to_owned()));
        }

        if let Some(tools) = &self.tools {
            let mut names = HashSet::new();
            for tool in tools {
                if !names.insert(tool.function.name.as_str()) {
                    return Err(LlmError::InvalidRequest(format!(
                        "duplicate tool name '{}'",
                        tool.function.name
                    )));
                }
            }
        }

        let mut emitted_ids: HashSet<&str> = HashSet::new();
        for message in &self.messages {
            if let Some(calls) = &message.tool_calls {
                emitted_ids.extend(calls.iter().map(|c| c.id.as_str()));
            }

            if message.role == Role::Tool {
                match &message.tool_call_id {
                    Some(id) if emitted_ids.contains(id.as_str()) => {}
                    Some(id) => {
                        return Err(LlmError::InvalidRequest(format!(
                            "tool result references unknown call id '{id}'"
                        )));
                    }
                    None => {
                        return Err(LlmError::InvalidRequest(
                            "tool result message is missing tool_call_id".to_owned(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Estimate token counts from message and tool-schema lengths
    pub fn estimate_tokens(&self) -> TokenEstimate {
        let mut chars: usize = 0;
        for message in &self.messages {
            chars += message.content.estimated_len();
        }

        // Tool schemas ride along in the prompt
        if let Some(tools) = &self.tools {
            chars += serde_json::to_string(tools).map_or(0, |s| s.len());
        }

        let overhead = MESSAGE_OVERHEAD_TOKENS * u32::try_from(self.messages.len()).unwrap_or(u32::MAX);
        let input_tokens = u32::try_from(chars / CHARS_PER_TOKEN)
            .unwrap_or(u32::MAX)
            .saturating_add(overhead);

        TokenEstimate {
            input_tokens,
            output_tokens: self.params.max_tokens.unwrap_or(DEFAULT_OUTPUT_TOKENS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::message::{FunctionCall, ToolCall};
    use crate::types::tool::FunctionDefinition;

    fn request(messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            model: "test".to_owned(),
            messages,
            params: CompletionParams::default(),
            tools: None,
            tool_choice: None,
            stream: false,
        }
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: name.to_owned(),
                description: None,
                parameters: None,
            },
        }
    }

    #[test]
    fn empty_messages_rejected() {
        assert!(request(vec![]).validate().is_err());
    }

    #[test]
    fn simple_request_validates() {
        let req = request(vec![Message::text(Role::User, "hello")]);
        req.validate().unwrap();
    }

    #[test]
    fn duplicate_tool_names_rejected() {
        let mut req = request(vec![Message::text(Role::User, "hi")]);
        req.tools = Some(vec![tool("lookup"), tool("lookup")]);
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("lookup"));
    }

    #[test]
    fn tool_result_must_reference_prior_call() {
        let mut assistant = Message::text(Role::Assistant, "");
        assistant.tool_calls = Some(vec![ToolCall {
            id: "call_1".to_owned(),
            function: FunctionCall {
                name: "lookup".to_owned(),
                arguments: "{}".to_owned(),
            },
        }]);

        let mut result = Message::text(Role::Tool, "42");
        result.tool_call_id = Some("call_1".to_owned());

        let req = request(vec![Message::text(Role::User, "hi"), assistant, result]);
        req.validate().unwrap();
    }

    #[test]
    fn dangling_tool_result_rejected() {
        let mut result = Message::text(Role::Tool, "42");
        result.tool_call_id = Some("call_unknown".to_owned());

        let req = request(vec![Message::text(Role::User, "hi"), result]);
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("call_unknown"));
    }

    #[test]
    fn tool_result_without_id_rejected() {
        let req = request(vec![Message::text(Role::User, "hi"), Message::text(Role::Tool, "42")]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn estimate_scales_with_content() {
        let short = request(vec![Message::text(Role::User, "hi")]);
        let long = request(vec![Message::text(Role::User, "long ".repeat(500))]);
        assert!(long.estimate_tokens().input_tokens > short.estimate_tokens().input_tokens);
    }

    #[test]
    fn estimate_counts_tool_schemas() {
        let bare = request(vec![Message::text(Role::User, "hi")]);
        let mut with_tools = bare.clone();
        with_tools.tools = Some(vec![ToolDefinition {
            tool_type: "function".to_owned(),
            function: FunctionDefinition {
                name: "lookup".to_owned(),
                description: Some("Look up a record by key".to_owned()),
                parameters: Some(serde_json::json!({
                    "type": "object",
                    "properties": {"key": {"type": "string"}}
                })),
            },
        }]);
        assert!(with_tools.estimate_tokens().input_tokens > bare.estimate_tokens().input_tokens);
    }

    #[test]
    fn output_estimate_honors_max_tokens() {
        let mut req = request(vec![Message::text(Role::User, "hi")]);
        req.params.max_tokens = Some(64);
        assert_eq!(req.estimate_tokens().output_tokens, 64);
    }
}
