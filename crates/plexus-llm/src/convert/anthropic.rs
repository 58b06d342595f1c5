//! Canonical ↔ Anthropic Messages conversion
//!
//! The Messages API hoists the system prompt out of the message list,
//! wraps tool activity in typed content blocks, and streams content as
//! indexed block events. Request/response conversion is a pure mapping;
//! stream conversion reassembles block events through `AnthropicStreamState`.

use std::time::{SystemTime, UNIX_EPOCH};

use super::parse_finish_reason;
use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicResponseBlock, AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent,
    AnthropicTool, AnthropicToolChoice,
};
use crate::types::{
    Choice, ChoiceMessage, CompletionRequest, CompletionResponse, Content, ContentPart, FunctionCall, Message, Role,
    StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall, ToolCall, ToolChoice, ToolChoiceMode, Usage,
};

/// `max_tokens` is mandatory on the wire; applied when the request sets none
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Outbound: canonical request -> Anthropic wire --

impl From<&CompletionRequest> for AnthropicRequest {
    fn from(req: &CompletionRequest) -> Self {
        let mut system = None;
        let mut messages = Vec::new();

        for msg in &req.messages {
            if msg.role == Role::System {
                // Last system message wins the top-level slot
                system = Some(msg.content.as_text());
            } else {
                messages.push(message_to_anthropic(msg));
            }
        }

        let tools = req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    input_schema: t
                        .function
                        .parameters
                        .clone()
                        .unwrap_or_else(|| serde_json::json!({"type": "object"})),
                })
                .collect()
        });

        Self {
            model: req.model.clone(),
            max_tokens: req.params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            stop_sequences: req.params.stop.clone(),
            stream: req.stream.then_some(true),
            tools,
            tool_choice: req.tool_choice.as_ref().map(tool_choice_to_anthropic),
        }
    }
}

fn message_to_anthropic(msg: &Message) -> AnthropicMessage {
    // Tool results travel as user-role tool_result blocks
    if msg.role == Role::Tool
        && let Some(tool_call_id) = &msg.tool_call_id
    {
        return AnthropicMessage {
            role: "user".to_owned(),
            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: Some(msg.content.as_text()),
            }]),
        };
    }

    let role = if msg.role == Role::Assistant { "assistant" } else { "user" };

    // Assistant tool calls become tool_use blocks after any text
    if let Some(tool_calls) = &msg.tool_calls {
        let mut blocks = Vec::new();

        let text = msg.content.as_text();
        if !text.is_empty() {
            blocks.push(AnthropicContentBlock::Text { text });
        }

        for tc in tool_calls {
            let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            blocks.push(AnthropicContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                input,
            });
        }

        return AnthropicMessage {
            role: role.to_owned(),
            content: AnthropicContent::Blocks(blocks),
        };
    }

    let content = match &msg.content {
        Content::Text(text) => AnthropicContent::Text(text.clone()),
        Content::Parts(parts) => AnthropicContent::Blocks(parts.iter().map(part_to_block).collect()),
    };

    AnthropicMessage {
        role: role.to_owned(),
        content,
    }
}

fn part_to_block(part: &ContentPart) -> AnthropicContentBlock {
    match part {
        ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
        ContentPart::Image { url, .. } => {
            if let Some(rest) = url.strip_prefix("data:")
                && let Some((mime_and_encoding, data)) = rest.split_once(',')
            {
                let media_type = mime_and_encoding.strip_suffix(";base64").unwrap_or(mime_and_encoding);
                AnthropicContentBlock::Image {
                    source: AnthropicImageSource {
                        source_type: "base64".to_owned(),
                        media_type: Some(media_type.to_owned()),
                        data: data.to_owned(),
                    },
                }
            } else {
                AnthropicContentBlock::Image {
                    source: AnthropicImageSource {
                        source_type: "url".to_owned(),
                        media_type: None,
                        data: url.clone(),
                    },
                }
            }
        }
    }
}

fn tool_choice_to_anthropic(choice: &ToolChoice) -> AnthropicToolChoice {
    match choice {
        ToolChoice::Mode(mode) => match mode {
            // The API has no "none" mode; both None and Auto map to "auto"
            ToolChoiceMode::None | ToolChoiceMode::Auto => AnthropicToolChoice {
                choice_type: "auto".to_owned(),
                name: None,
            },
            ToolChoiceMode::Required => AnthropicToolChoice {
                choice_type: "any".to_owned(),
                name: None,
            },
        },
        ToolChoice::Function(func) => AnthropicToolChoice {
            choice_type: "tool".to_owned(),
            name: Some(func.function.name.clone()),
        },
    }
}

// -- Inbound: Anthropic response -> canonical --

impl From<AnthropicResponse> for CompletionResponse {
    fn from(resp: AnthropicResponse) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in &resp.content {
            match block {
                AnthropicResponseBlock::Text { text: t } => text.push_str(t),
                // The wire id (toolu_…) is already stable; carried through
                // as the canonical call id
                AnthropicResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id: id.clone(),
                        function: FunctionCall {
                            name: name.clone(),
                            arguments: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_owned()),
                        },
                    });
                }
            }
        }

        Self {
            id: resp.id,
            object: "chat.completion".to_owned(),
            created,
            model: resp.model,
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage::from_parts(text, tool_calls),
                finish_reason: resp.stop_reason.as_deref().and_then(parse_finish_reason),
            }],
            usage: Some(Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            }),
        }
    }
}

// -- Streaming --

/// Per-response state for re-framing Anthropic stream events
///
/// The block index in vendor events is shared across text and tool_use
/// blocks, so it cannot serve as the canonical tool-call index: a tool use
/// following a text block would start at index 1 and leave a phantom entry
/// in consumers that index by it. The state assigns each tool_use block a
/// sequential call index instead, and remembers which call the current
/// `input_json_delta` fragments belong to. Scoped to one response; dropped
/// once `Done` is produced.
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    /// Sequential index of the tool call currently streaming
    current_call: u32,
    /// Next index to hand out at `content_block_start`
    next_call: u32,
    /// Usage totals accumulated across `message_start` and `message_delta`
    input_tokens: u32,
}

impl AnthropicStreamState {
    /// Fresh state for one response
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one vendor event into zero or more canonical events
    pub fn convert_event(&mut self, event: &AnthropicStreamEvent) -> Vec<StreamEvent> {
        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                // Prompt tokens arrive here; output tokens in message_delta
                if let Some(usage) = &message.usage {
                    self.input_tokens = usage.input_tokens;
                }
                Vec::new()
            }
            AnthropicStreamEvent::Ping | AnthropicStreamEvent::ContentBlockStop { .. } => Vec::new(),

            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                AnthropicStreamContentBlock::Text { .. } => Vec::new(),
                AnthropicStreamContentBlock::ToolUse { id, name, .. } => {
                    self.current_call = self.next_call;
                    self.next_call += 1;
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        content: None,
                        tool_call: Some(StreamToolCall {
                            index: self.current_call,
                            id: Some(id.clone()),
                            function: Some(StreamFunctionCall {
                                name: Some(name.clone()),
                                arguments: None,
                            }),
                        }),
                        finish_reason: None,
                    })]
                }
            },

            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                AnthropicStreamDelta::TextDelta { text } => vec![StreamEvent::Delta(StreamDelta::text(text.clone()))],
                AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                    vec![StreamEvent::Delta(StreamDelta {
                        index: 0,
                        content: None,
                        tool_call: Some(StreamToolCall {
                            index: self.current_call,
                            id: None,
                            function: Some(StreamFunctionCall {
                                name: None,
                                arguments: Some(partial_json.clone()),
                            }),
                        }),
                        finish_reason: None,
                    })]
                }
            },

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();

                if let Some(reason) = delta.stop_reason.as_deref().and_then(parse_finish_reason) {
                    events.push(StreamEvent::Delta(StreamDelta::finished(0, reason)));
                }

                if let Some(usage) = usage {
                    let input = if usage.input_tokens > 0 {
                        usage.input_tokens
                    } else {
                        self.input_tokens
                    };
                    events.push(StreamEvent::Usage(Usage {
                        prompt_tokens: input,
                        completion_tokens: usage.output_tokens,
                        total_tokens: input + usage.output_tokens,
                    }));
                }

                events
            }

            AnthropicStreamEvent::MessageStop => vec![StreamEvent::Done],
        }
    }
}
