//! Tool definitions and tool-call requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool as advertised by a server's `tools/list` response.
///
/// This is the wire-facing shape; the supervisor attaches the owning server
/// id to produce a [`Tool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name (function name).
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// JSON Schema for input parameters.
    #[serde(default)]
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    /// Create a descriptor with no description or schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// A tool attributed to the connection that exposes it.
///
/// Names are not globally unique; resolution is first-match in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Tool name (function name).
    pub name: String,

    /// Human-readable description (empty when the server gave none).
    pub description: String,

    /// JSON-schema-like description of the arguments.
    pub input_schema: Value,

    /// Id of the owning connection.
    pub server_id: String,
}

impl Tool {
    /// Attribute a descriptor to a server.
    pub fn from_descriptor(descriptor: ToolDescriptor, server_id: impl Into<String>) -> Self {
        Self {
            name: descriptor.name,
            description: descriptor.description.unwrap_or_default(),
            input_schema: descriptor.input_schema.unwrap_or(Value::Null),
            server_id: server_id.into(),
        }
    }
}

/// A request to invoke a tool, as produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Call id assigned by the model/provider.
    pub id: String,

    /// Name of the tool to invoke.
    pub name: String,

    /// Raw argument payload; expected to parse as a JSON object.
    pub arguments: String,
}

impl ToolCall {
    /// Create a tool call.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}
