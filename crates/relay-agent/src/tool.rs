//! Tool call types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool call an agent wants permission to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call.
    pub id: String,

    /// Name of the tool.
    pub name: String,

    /// Arguments for the tool.
    pub input: Value,
}

impl ToolCall {
    /// Create a tool call with a generated id.
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool call with an explicit id.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

impl std::fmt::Display for ToolCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.input)
    }
}

/// A tool call that an agent has already executed during its turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool.
    pub tool_name: String,

    /// Input the tool was called with, as sent to the tool.
    pub input: String,

    /// What the tool returned.
    pub output: String,
}

impl ToolInvocation {
    /// Record an executed tool call.
    pub fn new(
        tool_name: impl Into<String>,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            input: input.into(),
            output: output.into(),
        }
    }
}
