//! Read-only view of tool providers and the tools they expose.
//!
//! The runtime never changes a provider's status; it only reads snapshots
//! produced by a [`ToolHost`](crate::ToolHost).

use mcp::ServerStatus;
use serde::Serialize;
use serde_json::Value;

/// Connection state of a provider as observed by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl From<ServerStatus> for ProviderStatus {
    fn from(status: ServerStatus) -> Self {
        match status {
            ServerStatus::Connecting => Self::Connecting,
            ServerStatus::Connected => Self::Connected,
            ServerStatus::Disconnected => Self::Disconnected,
        }
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        ServerStatus::from(*self).fmt(f)
    }
}

impl From<ProviderStatus> for ServerStatus {
    fn from(status: ProviderStatus) -> Self {
        match status {
            ProviderStatus::Connecting => Self::Connecting,
            ProviderStatus::Connected => Self::Connected,
            ProviderStatus::Disconnected => Self::Disconnected,
        }
    }
}

/// A tool as described to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    /// Opaque JSON schema, forwarded as documentation only.
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

impl From<mcp::Tool> for ToolDescriptor {
    fn from(tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
        }
    }
}

/// Snapshot of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolProvider {
    pub name: String,
    pub status: ProviderStatus,
    pub tools: Vec<ToolDescriptor>,
}

impl ToolProvider {
    pub fn new(name: impl Into<String>, status: ProviderStatus) -> Self {
        Self {
            name: name.into(),
            status,
            tools: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: ToolDescriptor) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.status == ProviderStatus::Connected
    }
}

/// Find the connected provider with the given name.
pub fn find_connected<'a>(providers: &'a [ToolProvider], name: &str) -> Option<&'a ToolProvider> {
    providers
        .iter()
        .find(|p| p.name == name && p.is_connected())
}
