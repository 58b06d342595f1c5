//! Canonical ↔ Google Generative Language conversion
//!
//! The vendor has no call identifiers: function calls arrive bare and
//! results are keyed by function name. Conversion mints stable canonical
//! call ids from the function name plus a per-response counter, and
//! recovers names from request history when sending results back.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use super::parse_finish_reason;
use crate::protocol::google::{
    GoogleCandidate, GoogleContent, GoogleFunctionCall, GoogleFunctionCallingConfig, GoogleFunctionDeclaration,
    GoogleFunctionResponse, GoogleGenerationConfig, GoogleInlineData, GooglePart, GoogleRequest, GoogleResponse,
    GoogleTool, GoogleToolConfig,
};
use crate::types::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, Content, ContentPart, FunctionCall, Message, Role,
    StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall, ToolCall, ToolChoice, ToolChoiceMode, Usage,
};

// -- Outbound: canonical request -> Google wire --

impl From<&CompletionRequest> for GoogleRequest {
    fn from(req: &CompletionRequest) -> Self {
        // Call id -> function name, for translating tool results back into
        // name-keyed function responses
        let call_names: HashMap<&str, &str> = req
            .messages
            .iter()
            .filter_map(|m| m.tool_calls.as_ref())
            .flatten()
            .map(|tc| (tc.id.as_str(), tc.function.name.as_str()))
            .collect();

        let mut system_instruction = None;
        let mut contents = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => {
                    system_instruction = Some(GoogleContent {
                        role: None,
                        parts: vec![GooglePart::Text(msg.content.as_text())],
                    });
                }
                Role::User => contents.push(message_to_content(msg, "user")),
                Role::Assistant => contents.push(message_to_content(msg, "model")),
                Role::Tool => {
                    if let Some(call_id) = &msg.tool_call_id {
                        let text = msg.content.as_text();
                        let response = serde_json::from_str(&text)
                            .unwrap_or_else(|_| serde_json::json!({ "result": text }));
                        let name = call_names.get(call_id.as_str()).copied().unwrap_or(call_id.as_str());
                        contents.push(GoogleContent {
                            role: Some("function".to_owned()),
                            parts: vec![GooglePart::FunctionResponse(GoogleFunctionResponse {
                                name: name.to_owned(),
                                response,
                            })],
                        });
                    }
                }
            }
        }

        let tools = req.tools.as_ref().map(|tools| {
            vec![GoogleTool {
                function_declarations: tools
                    .iter()
                    .map(|t| GoogleFunctionDeclaration {
                        name: t.function.name.clone(),
                        description: t.function.description.clone(),
                        parameters: t.function.parameters.clone(),
                    })
                    .collect(),
            }]
        });

        let tool_config = req.tool_choice.as_ref().map(|tc| {
            let (mode, allowed) = match tc {
                ToolChoice::Mode(ToolChoiceMode::None) => ("NONE", None),
                ToolChoice::Mode(ToolChoiceMode::Auto) => ("AUTO", None),
                ToolChoice::Mode(ToolChoiceMode::Required) => ("ANY", None),
                ToolChoice::Function(func) => ("ANY", Some(vec![func.function.name.clone()])),
            };
            GoogleToolConfig {
                function_calling_config: GoogleFunctionCallingConfig {
                    mode: mode.to_owned(),
                    allowed_function_names: allowed,
                },
            }
        });

        Self {
            contents,
            system_instruction,
            generation_config: Some(GoogleGenerationConfig {
                temperature: req.params.temperature,
                top_p: req.params.top_p,
                max_output_tokens: req.params.max_tokens,
                stop_sequences: req.params.stop.clone(),
            }),
            tools,
            tool_config,
        }
    }
}

fn message_to_content(msg: &Message, role: &str) -> GoogleContent {
    let mut parts = Vec::new();

    match &msg.content {
        Content::Text(text) => {
            if !text.is_empty() {
                parts.push(GooglePart::Text(text.clone()));
            }
        }
        Content::Parts(content_parts) => {
            for part in content_parts {
                match part {
                    ContentPart::Text { text } => parts.push(GooglePart::Text(text.clone())),
                    ContentPart::Image { url, .. } => {
                        // Only data URIs can ride inline; plain URLs are dropped
                        if let Some(rest) = url.strip_prefix("data:")
                            && let Some((mime_and_encoding, data)) = rest.split_once(',')
                        {
                            let mime_type = mime_and_encoding.strip_suffix(";base64").unwrap_or(mime_and_encoding);
                            parts.push(GooglePart::InlineData(GoogleInlineData {
                                mime_type: mime_type.to_owned(),
                                data: data.to_owned(),
                            }));
                        }
                    }
                }
            }
        }
    }

    if let Some(tool_calls) = &msg.tool_calls {
        for tc in tool_calls {
            let args = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            parts.push(GooglePart::FunctionCall(GoogleFunctionCall {
                name: tc.function.name.clone(),
                args,
            }));
        }
    }

    if parts.is_empty() {
        parts.push(GooglePart::Text(String::new()));
    }

    GoogleContent {
        role: Some(role.to_owned()),
        parts,
    }
}

// -- Inbound: Google response -> canonical --

/// Mint a stable canonical call id for a bare vendor function call
fn mint_call_id(name: &str, ordinal: u32) -> String {
    format!("call_{name}_{ordinal}")
}

/// Convert a complete response, filling in the model name the vendor omits
pub fn response_to_completion(resp: &GoogleResponse, model: &str) -> CompletionResponse {
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut next_call = 0u32;
    let choices = resp
        .candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| candidate_to_choice(candidate, u32::try_from(i).unwrap_or(u32::MAX), &mut next_call))
        .collect();

    CompletionResponse {
        id: format!("gen-{created}"),
        object: "chat.completion".to_owned(),
        created,
        model: model.to_owned(),
        choices,
        usage: resp.usage_metadata.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }),
    }
}

fn candidate_to_choice(candidate: &GoogleCandidate, default_index: u32, next_call: &mut u32) -> Choice {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in &candidate.content.parts {
        match part {
            GooglePart::Text(t) => text.push_str(t),
            GooglePart::FunctionCall(fc) => {
                let id = mint_call_id(&fc.name, *next_call);
                *next_call += 1;
                tool_calls.push(ToolCall {
                    id,
                    function: FunctionCall {
                        name: fc.name.clone(),
                        arguments: serde_json::to_string(&fc.args).unwrap_or_else(|_| "{}".to_owned()),
                    },
                });
            }
            GooglePart::InlineData(_) | GooglePart::FunctionResponse(_) => {}
        }
    }

    let finish_reason = candidate.finish_reason.as_deref().and_then(parse_finish_reason);
    // The vendor reports STOP even when the turn ended on a function call
    let finish_reason = if !tool_calls.is_empty() && finish_reason == Some(crate::types::FinishReason::Stop) {
        Some(crate::types::FinishReason::ToolCalls)
    } else {
        finish_reason
    };

    Choice {
        index: candidate.index.unwrap_or(default_index),
        message: ChoiceMessage::from_parts(text, tool_calls),
        finish_reason,
    }
}

// -- Streaming --

/// Per-response state for re-framing the Google streamed-candidate framing
///
/// Chunks are whole `GoogleResponse` objects over SSE with no terminal
/// sentinel; the terminal chunk is the one carrying a finish reason. The
/// state mints sequential call ids across chunks and emits the canonical
/// `Done` after the terminal chunk has been translated. Scoped to one
/// response; dropped with it.
#[derive(Debug, Default)]
pub struct GoogleStreamState {
    /// Next ordinal for minted call ids, shared across chunks
    next_call: u32,
    /// A finish reason has been seen; `Done` goes out after this chunk
    finished: bool,
}

impl GoogleStreamState {
    /// Fresh state for one response
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one streamed chunk into zero or more canonical events
    pub fn convert_chunk(&mut self, chunk: &GoogleResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        for (i, candidate) in chunk.candidates.iter().enumerate() {
            let index = candidate.index.unwrap_or(u32::try_from(i).unwrap_or(u32::MAX));

            for part in &candidate.content.parts {
                match part {
                    GooglePart::Text(text) => {
                        events.push(StreamEvent::Delta(StreamDelta {
                            index,
                            content: Some(text.clone()),
                            tool_call: None,
                            finish_reason: None,
                        }));
                    }
                    GooglePart::FunctionCall(fc) => {
                        // Whole calls arrive atomically; one delta carries
                        // id, name, and complete arguments
                        let call = self.next_call;
                        self.next_call += 1;
                        events.push(StreamEvent::Delta(StreamDelta {
                            index,
                            content: None,
                            tool_call: Some(StreamToolCall {
                                index: call,
                                id: Some(mint_call_id(&fc.name, call)),
                                function: Some(StreamFunctionCall {
                                    name: Some(fc.name.clone()),
                                    arguments: Some(
                                        serde_json::to_string(&fc.args).unwrap_or_else(|_| "{}".to_owned()),
                                    ),
                                }),
                            }),
                            finish_reason: None,
                        }));
                    }
                    GooglePart::InlineData(_) | GooglePart::FunctionResponse(_) => {}
                }
            }

            if let Some(reason) = candidate.finish_reason.as_deref().and_then(parse_finish_reason) {
                self.finished = true;
                events.push(StreamEvent::Delta(StreamDelta::finished(index, reason)));
            }
        }

        if let Some(usage) = &chunk.usage_metadata {
            events.push(StreamEvent::Usage(Usage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            }));
        }

        if self.finished {
            self.finished = false;
            events.push(StreamEvent::Done);
        }

        events
    }
}
