//! Conversions between the canonical model and vendor wire formats
//!
//! One module per protocol family. Non-streaming conversions are pure
//! mappings; streaming conversions that need to reassemble vendor framing
//! into canonical events hold per-response state
//! (`AnthropicStreamState`, `GoogleStreamState`) that is created for one
//! response and dropped with it.

pub mod anthropic;
pub mod google;
pub mod openai;

use crate::types::FinishReason;

/// Parse a vendor finish/stop reason string into the canonical enum
pub(crate) fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" | "end_turn" | "STOP" => Some(FinishReason::Stop),
        "length" | "max_tokens" | "MAX_TOKENS" => Some(FinishReason::Length),
        "tool_calls" | "tool_use" => Some(FinishReason::ToolCalls),
        "content_filter" | "SAFETY" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

/// Render a canonical finish reason in the client dialect
pub(crate) const fn finish_reason_str(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "stop",
        FinishReason::Length => "length",
        FinishReason::ToolCalls => "tool_calls",
        FinishReason::ContentFilter => "content_filter",
    }
}
