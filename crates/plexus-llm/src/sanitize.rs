//! Tool-schema sanitation per vendor dialect
//!
//! Vendors accept different subsets of JSON Schema in tool parameter
//! definitions; sending an unsupported keyword gets the whole request
//! rejected (Google returns `INVALID_ARGUMENT 400` for `default` or
//! `additionalProperties`). The sanitizer rewrites a schema tree for a
//! target dialect: unsupported keywords are dropped at every node,
//! supported structure is preserved verbatim.
//!
//! Pure and non-mutating: the input tree is never modified, the result is a
//! new tree, and sanitizing twice equals sanitizing once.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::types::CompletionRequest;

/// Schema constructs a vendor's tool dialect rejects
#[derive(Debug, Clone, Copy)]
pub struct DialectCapabilities {
    /// Dialect name for logs
    pub name: &'static str,
    /// Keywords removed from every schema node
    pub unsupported_keywords: &'static [&'static str],
}

/// OpenAI-compatible APIs accept full JSON Schema
pub const OPENAI_DIALECT: DialectCapabilities = DialectCapabilities {
    name: "openai",
    unsupported_keywords: &[],
};

/// Anthropic rejects draft-identifier metadata in `input_schema`
pub const ANTHROPIC_DIALECT: DialectCapabilities = DialectCapabilities {
    name: "anthropic",
    unsupported_keywords: &["$schema"],
};

/// Google accepts only a small OpenAPI schema subset
pub const GOOGLE_DIALECT: DialectCapabilities = DialectCapabilities {
    name: "google",
    unsupported_keywords: &[
        "$schema",
        "additionalProperties",
        "exclusiveMinimum",
        "exclusiveMaximum",
        "default",
    ],
};

/// Schema `type` values the sanitizer understands
const KNOWN_TYPES: &[&str] = &["object", "array", "string", "number", "integer", "boolean", "null"];

/// Keywords whose values are themselves schema nodes (or arrays of them)
const NESTED_SCHEMA_KEYWORDS: &[&str] = &["items", "anyOf", "oneOf", "allOf"];

impl DialectCapabilities {
    fn rejects(&self, keyword: &str) -> bool {
        self.unsupported_keywords.contains(&keyword)
    }
}

/// Rewrite a schema tree for the target dialect
///
/// Returns a new tree; the input is untouched. A node whose `type` is an
/// unrecognized string passes through unchanged rather than erroring, so
/// unsanitizable content degrades gracefully instead of aborting the
/// request.
pub fn sanitize(schema: &Value, dialect: &DialectCapabilities) -> Value {
    let Value::Object(node) = schema else {
        return schema.clone();
    };

    // Unrecognized node type: pass through untouched (permissive by policy)
    if let Some(Value::String(node_type)) = node.get("type")
        && !KNOWN_TYPES.contains(&node_type.as_str())
    {
        return schema.clone();
    }

    let mut out = Map::with_capacity(node.len());
    for (keyword, value) in node {
        if dialect.rejects(keyword) {
            tracing::trace!(dialect = dialect.name, keyword, "dropped unsupported schema keyword");
            continue;
        }

        let sanitized = if keyword == "properties" {
            sanitize_properties(value, dialect)
        } else if NESTED_SCHEMA_KEYWORDS.contains(&keyword.as_str()) {
            sanitize_nested(value, dialect)
        } else {
            value.clone()
        };

        out.insert(keyword.clone(), sanitized);
    }

    Value::Object(out)
}

/// Sanitize every property schema in a `properties` map
fn sanitize_properties(value: &Value, dialect: &DialectCapabilities) -> Value {
    match value {
        Value::Object(props) => Value::Object(
            props
                .iter()
                .map(|(name, schema)| (name.clone(), sanitize(schema, dialect)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Sanitize a nested schema value: a single node or an array of nodes
fn sanitize_nested(value: &Value, dialect: &DialectCapabilities) -> Value {
    match value {
        Value::Array(nodes) => Value::Array(nodes.iter().map(|n| sanitize(n, dialect)).collect()),
        node => sanitize(node, dialect),
    }
}

/// Apply the dialect's sanitizer to every tool schema in a request
///
/// Borrows the request unchanged when there is nothing to rewrite.
pub fn sanitize_request<'a>(request: &'a CompletionRequest, dialect: &DialectCapabilities) -> Cow<'a, CompletionRequest> {
    if dialect.unsupported_keywords.is_empty() || !request.uses_tools() {
        return Cow::Borrowed(request);
    }

    let mut sanitized = request.clone();
    if let Some(tools) = &mut sanitized.tools {
        for tool in tools {
            if let Some(parameters) = &tool.function.parameters {
                tool.function.parameters = Some(sanitize(parameters, dialect));
            }
        }
    }
    Cow::Owned(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_unsupported_keywords_at_every_level() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "x": {"type": "number", "exclusiveMinimum": 0}
            }
        });

        let cleaned = sanitize(&schema, &GOOGLE_DIALECT);
        assert_eq!(
            cleaned,
            json!({
                "type": "object",
                "properties": {
                    "x": {"type": "number"}
                }
            })
        );
    }

    #[test]
    fn preserves_supported_structure() {
        let schema = json!({
            "type": "object",
            "description": "a record",
            "required": ["kind"],
            "properties": {
                "kind": {"type": "string", "enum": ["a", "b"]},
                "count": {"type": "integer", "minimum": 0}
            }
        });

        assert_eq!(sanitize(&schema, &GOOGLE_DIALECT), schema);
    }

    #[test]
    fn idempotent() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {"type": "number", "exclusiveMaximum": 100, "default": 1}
                }
            }
        });

        let once = sanitize(&schema, &GOOGLE_DIALECT);
        let twice = sanitize(&once, &GOOGLE_DIALECT);
        assert_eq!(once, twice);
    }

    #[test]
    fn input_is_not_mutated() {
        let schema = json!({"type": "object", "additionalProperties": false});
        let copy = schema.clone();
        let _ = sanitize(&schema, &GOOGLE_DIALECT);
        assert_eq!(schema, copy);
    }

    #[test]
    fn unrecognized_type_passes_through() {
        let schema = json!({
            "type": "tensor",
            "additionalProperties": false,
            "shape": [3, 3]
        });

        assert_eq!(sanitize(&schema, &GOOGLE_DIALECT), schema);
    }

    #[test]
    fn recurses_into_composition_keywords() {
        let schema = json!({
            "anyOf": [
                {"type": "string", "default": "x"},
                {"type": "number", "exclusiveMinimum": 0}
            ]
        });

        let cleaned = sanitize(&schema, &GOOGLE_DIALECT);
        assert_eq!(
            cleaned,
            json!({
                "anyOf": [
                    {"type": "string"},
                    {"type": "number"}
                ]
            })
        );
    }

    #[test]
    fn openai_dialect_keeps_everything() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {"x": {"type": "number", "exclusiveMinimum": 0}}
        });

        assert_eq!(sanitize(&schema, &OPENAI_DIALECT), schema);
    }

    #[test]
    fn anthropic_dialect_strips_draft_identifier_only() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "additionalProperties": false
        });

        let cleaned = sanitize(&schema, &ANTHROPIC_DIALECT);
        assert_eq!(cleaned, json!({"type": "object", "additionalProperties": false}));
    }

    #[test]
    fn request_sanitation_borrows_when_nothing_to_do() {
        let request = CompletionRequest {
            model: "m".to_owned(),
            messages: vec![crate::types::Message::text(crate::types::Role::User, "hi")],
            params: crate::types::CompletionParams::default(),
            tools: None,
            tool_choice: None,
            stream: false,
        };
        assert!(matches!(sanitize_request(&request, &GOOGLE_DIALECT), Cow::Borrowed(_)));
    }
}
