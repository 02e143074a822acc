use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a single tool call.
///
/// Their display text is what the model sees in the `error` field of the
/// corresponding tool result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("no connected provider named {0}")]
    ProviderUnavailable(String),
    #[error("tool call timed out after {0}ms")]
    Timeout(u64),
    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout(u64::try_from(after.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<mcp::Error> for ToolError {
    fn from(error: mcp::Error) -> Self {
        match error {
            mcp::Error::Timeout(after) => Self::timeout(after),
            other => Self::Execution(other.to_string()),
        }
    }
}
