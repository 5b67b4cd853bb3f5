//! Remote tool result shapes and their normalization to text.
//!
//! Servers answer `tools/call` with one of several shapes: a list of typed
//! content blocks, a bare string, an arbitrary object, or nothing at all.
//! [`ToolOutput`] captures that once at the protocol boundary so the rest of
//! the pipeline only ever sees a tagged value.

use serde_json::Value;

/// Marker returned when a tool produced no result at all.
pub const NO_OUTPUT_MARKER: &str = "Tool executed successfully (no output)";

/// Marker returned when a structured result could not be rendered.
pub const FORMAT_FAILED_MARKER: &str = "Tool executed successfully, but result formatting failed";

/// One block of a content-list result.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    /// `{"type": "text", "text": ...}`
    Text(String),
    /// Any other block (images, resources, ...), kept verbatim.
    Other(Value),
}

impl ContentBlock {
    fn from_value(block: Value) -> Self {
        let is_text = block.get("type").and_then(Value::as_str) == Some("text");
        match block.get("text").and_then(Value::as_str) {
            Some(text) if is_text => Self::Text(text.to_string()),
            _ => Self::Other(block),
        }
    }
}

/// Raw result of a remote tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// `{"content": [...]}` block list.
    Content(Vec<ContentBlock>),
    /// Bare string result.
    Text(String),
    /// Any other JSON value.
    Structured(Value),
    /// No result.
    Empty,
}

impl ToolOutput {
    /// Classify a raw result value.
    pub fn from_raw(raw: Option<Value>) -> Self {
        match raw {
            None | Some(Value::Null) => Self::Empty,
            Some(Value::String(text)) => Self::Text(text),
            Some(Value::Object(mut map)) => match map.remove("content") {
                Some(Value::Array(blocks)) => {
                    Self::Content(blocks.into_iter().map(ContentBlock::from_value).collect())
                }
                Some(other) => {
                    map.insert("content".to_string(), other);
                    Self::Structured(Value::Object(map))
                }
                None => Self::Structured(Value::Object(map)),
            },
            Some(other) => Self::Structured(other),
        }
    }

    /// Render the result as the single output string handed to callers.
    pub fn normalize(&self) -> String {
        match self {
            Self::Content(blocks) => blocks
                .iter()
                .map(|block| match block {
                    ContentBlock::Text(text) => text.clone(),
                    ContentBlock::Other(value) => value.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Text(text) => text.clone(),
            Self::Structured(value) => serde_json::to_string_pretty(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to render structured tool result");
                FORMAT_FAILED_MARKER.to_string()
            }),
            Self::Empty => NO_OUTPUT_MARKER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_blocks_joined() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "AAAA", "mimeType": "image/png"},
                {"type": "text", "text": "line two"}
            ]
        });

        let output = ToolOutput::from_raw(Some(raw));
        let text = output.normalize();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "line one");
        assert!(lines[1].contains("\"type\":\"image\""));
        assert_eq!(lines[2], "line two");
    }

    #[test]
    fn test_bare_string_passes_through() {
        let output = ToolOutput::from_raw(Some(json!("hello")));
        assert_eq!(output, ToolOutput::Text("hello".to_string()));
        assert_eq!(output.normalize(), "hello");
    }

    #[test]
    fn test_object_is_pretty_printed() {
        let output = ToolOutput::from_raw(Some(json!({"result": "success"})));
        assert_eq!(output.normalize(), "{\n  \"result\": \"success\"\n}");
    }

    #[test]
    fn test_missing_result_yields_marker() {
        assert_eq!(ToolOutput::from_raw(None).normalize(), NO_OUTPUT_MARKER);
        assert_eq!(
            ToolOutput::from_raw(Some(Value::Null)).normalize(),
            NO_OUTPUT_MARKER
        );
    }

    #[test]
    fn test_non_array_content_is_structured() {
        let output = ToolOutput::from_raw(Some(json!({"content": "plain"})));
        assert!(matches!(output, ToolOutput::Structured(_)));
        assert!(output.normalize().contains("\"content\": \"plain\""));
    }
}
