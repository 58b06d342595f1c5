//! Canonical ↔ `OpenAI` wire conversion
//!
//! Serves two edges: the client-facing front end (inbound request parsing,
//! outbound response framing) and the OpenAI-compatible provider adapter.

use super::{finish_reason_str, parse_finish_reason};
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiFunctionCall,
    OpenAiImageUrl, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChoice, OpenAiStreamChunk,
    OpenAiStreamDelta, OpenAiStreamFunctionCall, OpenAiStreamToolCall, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::types::{
    Choice, ChoiceMessage, CompletionParams, CompletionRequest, CompletionResponse, Content, ContentPart, FunctionCall,
    FunctionDefinition, Message, Role, StreamDelta, StreamEvent, StreamFunctionCall, StreamToolCall, ToolCall,
    ToolChoice, ToolChoiceFunction, ToolChoiceMode, ToolDefinition, Usage,
};

// -- Inbound: OpenAI wire -> canonical --

impl From<OpenAiRequest> for CompletionRequest {
    fn from(req: OpenAiRequest) -> Self {
        Self {
            model: req.model,
            messages: req.messages.into_iter().map(Into::into).collect(),
            params: CompletionParams {
                temperature: req.temperature,
                top_p: req.top_p,
                max_tokens: req.max_tokens,
                stop: req.stop,
                seed: req.seed,
            },
            tools: req.tools.map(|tools| tools.into_iter().map(Into::into).collect()),
            tool_choice: req.tool_choice.and_then(|v| parse_tool_choice(&v)),
            stream: req.stream.unwrap_or(false),
        }
    }
}

impl From<OpenAiMessage> for Message {
    fn from(msg: OpenAiMessage) -> Self {
        let role = match msg.role.as_str() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::User,
        };

        let content = match msg.content {
            Some(OpenAiContent::Text(text)) => Content::Text(text),
            Some(OpenAiContent::Parts(parts)) => Content::Parts(parts.into_iter().map(Into::into).collect()),
            None => Content::Text(String::new()),
        };

        Self {
            role,
            content,
            name: msg.name,
            tool_calls: msg.tool_calls.map(|calls| calls.into_iter().map(Into::into).collect()),
            tool_call_id: msg.tool_call_id,
        }
    }
}

impl From<OpenAiContentPart> for ContentPart {
    fn from(part: OpenAiContentPart) -> Self {
        match part {
            OpenAiContentPart::Text { text } => Self::Text { text },
            OpenAiContentPart::ImageUrl { image_url } => Self::Image {
                url: image_url.url,
                detail: image_url.detail,
            },
        }
    }
}

impl From<OpenAiToolCall> for ToolCall {
    fn from(tc: OpenAiToolCall) -> Self {
        Self {
            id: tc.id,
            function: FunctionCall {
                name: tc.function.name,
                arguments: tc.function.arguments,
            },
        }
    }
}

impl From<OpenAiTool> for ToolDefinition {
    fn from(tool: OpenAiTool) -> Self {
        Self {
            tool_type: tool.tool_type,
            function: FunctionDefinition {
                name: tool.function.name,
                description: tool.function.description,
                parameters: tool.function.parameters,
            },
        }
    }
}

/// Parse the flexible `tool_choice` field: a mode string or function object
fn parse_tool_choice(value: &serde_json::Value) -> Option<ToolChoice> {
    match value {
        serde_json::Value::String(s) => match s.as_str() {
            "none" => Some(ToolChoice::Mode(ToolChoiceMode::None)),
            "auto" => Some(ToolChoice::Mode(ToolChoiceMode::Auto)),
            "required" => Some(ToolChoice::Mode(ToolChoiceMode::Required)),
            _ => None,
        },
        serde_json::Value::Object(_) => serde_json::from_value::<ToolChoiceFunction>(value.clone())
            .ok()
            .map(ToolChoice::Function),
        _ => None,
    }
}

// -- Outbound: canonical request -> OpenAI wire --

impl From<&CompletionRequest> for OpenAiRequest {
    fn from(req: &CompletionRequest) -> Self {
        Self {
            model: req.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_tokens: req.params.max_tokens,
            stop: req.params.stop.clone(),
            seed: req.params.seed,
            stream: req.stream.then_some(true),
            tools: req.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: t.tool_type.clone(),
                        function: OpenAiFunction {
                            name: t.function.name.clone(),
                            description: t.function.description.clone(),
                            parameters: t.function.parameters.clone(),
                        },
                    })
                    .collect()
            }),
            tool_choice: req.tool_choice.as_ref().map(tool_choice_value),
            stream_options: None,
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let content = match &msg.content {
            Content::Text(text) => Some(OpenAiContent::Text(text.clone())),
            Content::Parts(parts) => Some(OpenAiContent::Parts(parts.iter().map(Into::into).collect())),
        };

        Self {
            role: role.to_owned(),
            content,
            name: msg.name.clone(),
            tool_calls: msg
                .tool_calls
                .as_ref()
                .map(|calls| calls.iter().map(openai_tool_call).collect()),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

impl From<&ContentPart> for OpenAiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text: text.clone() },
            ContentPart::Image { url, detail } => Self::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: url.clone(),
                    detail: detail.clone(),
                },
            },
        }
    }
}

fn openai_tool_call(tc: &ToolCall) -> OpenAiToolCall {
    OpenAiToolCall {
        id: tc.id.clone(),
        tool_type: "function".to_owned(),
        function: OpenAiFunctionCall {
            name: tc.function.name.clone(),
            arguments: tc.function.arguments.clone(),
        },
    }
}

fn tool_choice_value(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Mode(mode) => {
            let s = match mode {
                ToolChoiceMode::None => "none",
                ToolChoiceMode::Auto => "auto",
                ToolChoiceMode::Required => "required",
            };
            serde_json::Value::String(s.to_owned())
        }
        ToolChoice::Function(func) => serde_json::json!({
            "type": func.tool_type,
            "function": { "name": func.function.name }
        }),
    }
}

// -- Responses --

impl From<OpenAiResponse> for CompletionResponse {
    fn from(resp: OpenAiResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|c| Choice {
                    index: c.index,
                    message: ChoiceMessage {
                        role: c.message.role,
                        content: c.message.content,
                        tool_calls: c
                            .message
                            .tool_calls
                            .map(|calls| calls.into_iter().map(Into::into).collect()),
                    },
                    finish_reason: c.finish_reason.as_deref().and_then(parse_finish_reason),
                })
                .collect(),
            usage: resp.usage.map(Into::into),
        }
    }
}

impl From<CompletionResponse> for OpenAiResponse {
    fn from(resp: CompletionResponse) -> Self {
        Self {
            id: resp.id,
            object: resp.object,
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|c| OpenAiChoice {
                    index: c.index,
                    message: OpenAiChoiceMessage {
                        role: c.message.role,
                        content: c.message.content,
                        tool_calls: c
                            .message
                            .tool_calls
                            .map(|calls| calls.iter().map(openai_tool_call).collect()),
                    },
                    finish_reason: c.finish_reason.map(|fr| finish_reason_str(fr).to_owned()),
                })
                .collect(),
            usage: resp.usage.map(|u| OpenAiUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        }
    }
}

impl From<OpenAiUsage> for Usage {
    fn from(usage: OpenAiUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

// -- Streaming --

/// Translate one `OpenAI` stream chunk into canonical events
///
/// The `OpenAI` framing is already delta-shaped, so no per-response state
/// is needed; a chunk maps to zero or more events.
pub fn chunk_to_events(chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    for choice in &chunk.choices {
        let tool_call = choice
            .delta
            .tool_calls
            .as_ref()
            .and_then(|calls| calls.first())
            .map(|tc| StreamToolCall {
                index: tc.index,
                id: tc.id.clone(),
                function: tc.function.as_ref().map(|f| StreamFunctionCall {
                    name: f.name.clone(),
                    arguments: f.arguments.clone(),
                }),
            });

        events.push(StreamEvent::Delta(StreamDelta {
            index: choice.index,
            content: choice.delta.content.clone(),
            tool_call,
            finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
        }));
    }

    if let Some(usage) = &chunk.usage {
        events.push(StreamEvent::Usage(usage.clone().into()));
    }

    events
}

/// Frame a canonical delta as an `OpenAI` stream chunk
pub fn delta_to_chunk(delta: &StreamDelta, id: &str, model: &str, created: u64) -> OpenAiStreamChunk {
    let tool_calls = delta.tool_call.as_ref().map(|tc| {
        vec![OpenAiStreamToolCall {
            index: tc.index,
            id: tc.id.clone(),
            // "type" rides with the id on the first fragment only
            tool_type: tc.id.as_ref().map(|_| "function".to_owned()),
            function: tc.function.as_ref().map(|f| OpenAiStreamFunctionCall {
                name: f.name.clone(),
                arguments: f.arguments.clone(),
            }),
        }]
    });

    OpenAiStreamChunk {
        id: id.to_owned(),
        object: "chat.completion.chunk".to_owned(),
        created,
        model: model.to_owned(),
        choices: vec![OpenAiStreamChoice {
            index: delta.index,
            delta: OpenAiStreamDelta {
                role: None,
                content: delta.content.clone(),
                tool_calls,
            },
            finish_reason: delta.finish_reason.map(|fr| finish_reason_str(fr).to_owned()),
        }],
        usage: None,
    }
}

/// Frame a canonical usage event as the final `OpenAI` usage chunk
pub fn usage_to_chunk(usage: &Usage, id: &str, model: &str, created: u64) -> OpenAiStreamChunk {
    OpenAiStreamChunk {
        id: id.to_owned(),
        object: "chat.completion.chunk".to_owned(),
        created,
        model: model.to_owned(),
        choices: vec![],
        usage: Some(OpenAiUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_request() -> OpenAiRequest {
        serde_json::from_value(serde_json::json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "What's the weather in Paris?"},
                {"role": "assistant", "tool_calls": [{
                    "id": "call_w1",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
                }]},
                {"role": "tool", "tool_call_id": "call_w1", "content": "18C, clear"}
            ],
            "temperature": 0.2,
            "tools": [{
                "type": "function",
                "function": {"name": "get_weather", "parameters": {"type": "object"}}
            }]
        }))
        .unwrap()
    }

    #[test]
    fn inbound_request_preserves_tool_linkage() {
        let canonical: CompletionRequest = wire_request().into();
        canonical.validate().unwrap();

        assert_eq!(canonical.messages.len(), 4);
        assert_eq!(canonical.messages[3].tool_call_id.as_deref(), Some("call_w1"));
        let calls = canonical.messages[2].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "call_w1");
        assert_eq!(calls[0].function.name, "get_weather");
    }

    #[test]
    fn request_round_trips_through_wire_form() {
        let canonical: CompletionRequest = wire_request().into();
        let wire: OpenAiRequest = (&canonical).into();
        let back: CompletionRequest = wire.into();

        assert_eq!(back.model, canonical.model);
        assert_eq!(back.messages.len(), canonical.messages.len());
        assert_eq!(
            back.messages[2].tool_calls.as_ref().unwrap()[0].id,
            canonical.messages[2].tool_calls.as_ref().unwrap()[0].id
        );
        assert_eq!(back.params.temperature, canonical.params.temperature);
    }

    #[test]
    fn response_round_trips_tool_calls() {
        let wire: OpenAiResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_w1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }))
        .unwrap();

        let canonical: CompletionResponse = wire.into();
        assert_eq!(
            canonical.choices[0].finish_reason,
            Some(crate::types::FinishReason::ToolCalls)
        );
        let calls = canonical.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].id, "call_w1");

        let out: OpenAiResponse = canonical.into();
        assert_eq!(out.choices[0].message.tool_calls.as_ref().unwrap()[0].id, "call_w1");
        assert_eq!(out.choices[0].finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn chunk_translation_keeps_tool_fragments_ordered() {
        let chunk: OpenAiStreamChunk = serde_json::from_value(serde_json::json!({
            "id": "c1", "object": "chat.completion.chunk", "created": 1, "model": "m",
            "choices": [{
                "index": 0,
                "delta": {"tool_calls": [{
                    "index": 0,
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "lookup", "arguments": null}
                }]},
                "finish_reason": null
            }]
        }))
        .unwrap();

        let events = chunk_to_events(&chunk);
        assert_eq!(events.len(), 1);
        let StreamEvent::Delta(delta) = &events[0] else {
            panic!("expected delta");
        };
        let tc = delta.tool_call.as_ref().unwrap();
        assert_eq!(tc.id.as_deref(), Some("call_1"));
        assert_eq!(tc.function.as_ref().unwrap().name.as_deref(), Some("lookup"));
    }

    #[test]
    fn usage_chunk_has_empty_choices() {
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        let chunk = usage_to_chunk(&usage, "id", "m", 0);
        assert!(chunk.choices.is_empty());
        assert_eq!(chunk.usage.unwrap().total_tokens, 15);
    }
}
