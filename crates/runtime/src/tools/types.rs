//! Tool-related types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation parsed from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub provider_name: String,
    pub tool_name: String,
    pub args: Value,
}

impl ToolCall {
    pub fn new(provider_name: impl Into<String>, tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            provider_name: provider_name.into(),
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// What a tool call produced: rendered output or an error message, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutcome {
    Result(String),
    Error(String),
}

/// The result of one tool call, as reported back to the model.
///
/// Serializes flat: `{"providerName", "toolName", "result" | "error"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub provider_name: String,
    pub tool_name: String,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
}

impl ToolResult {
    /// Create a successful result for a call.
    pub fn success(call: &ToolCall, output: impl Into<String>) -> Self {
        Self::with_outcome(call, ToolOutcome::Result(output.into()))
    }

    /// Create an error result for a call.
    pub fn error(call: &ToolCall, message: impl Into<String>) -> Self {
        Self::with_outcome(call, ToolOutcome::Error(message.into()))
    }

    fn with_outcome(call: &ToolCall, outcome: ToolOutcome) -> Self {
        Self {
            provider_name: call.provider_name.clone(),
            tool_name: call.tool_name.clone(),
            outcome,
        }
    }

    pub fn result(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Result(output) => Some(output),
            ToolOutcome::Error(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Error(message) => Some(message),
            ToolOutcome::Result(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error(_))
    }
}
