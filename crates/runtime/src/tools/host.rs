//! Tool host trait.

use crate::registry::ToolProvider;
use crate::tools::{ToolCall, ToolError};
use mcp::ToolContent;
use std::future::Future;
use std::time::Duration;

/// Trait for tool execution hosts.
///
/// This is the boundary between the conversation loop and side effects:
/// the host owns provider connections, the runtime only reads snapshots of
/// them and asks for calls to be made.
pub trait ToolHost: Send + Sync {
    /// Snapshot of every known provider, in a stable order.
    fn providers(&self) -> Vec<ToolProvider>;

    /// Execute a tool call on the provider it names.
    ///
    /// `timeout` is the budget the caller will wait; hosts may use it for
    /// their own protocol deadlines.
    fn call_tool(
        &self,
        call: &ToolCall,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<ToolContent>, ToolError>> + Send;
}
