//! MCP-backed tool host.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mcp::{Server, ServerConfig, ServerStatus, ToolContent};
use tracing::{debug, info, warn};

use crate::registry::{ToolDescriptor, ToolProvider};
use crate::tools::{ToolCall, ToolError, ToolHost};

/// Tool host backed by a set of MCP servers.
pub struct McpToolHost {
    servers: Vec<Arc<Server>>,
}

impl McpToolHost {
    /// Create a host over servers that are already running.
    pub fn new(servers: Vec<Arc<Server>>) -> Self {
        Self { servers }
    }

    /// Create an empty tool host (no MCP servers).
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Spawn and initialize every configured server concurrently.
    ///
    /// A server that fails to start or to complete the handshake is logged
    /// and left out; the others are still usable.
    pub async fn connect(configs: Vec<ServerConfig>) -> Self {
        info!(count = configs.len(), "connecting to MCP servers");
        let attempts = configs.into_iter().map(|config| async move {
            let name = config.name.clone();
            let server = match Server::spawn(config).await {
                Ok(server) => server,
                Err(e) => {
                    warn!(server = %name, error = %e, "failed to start MCP server");
                    return None;
                }
            };
            if let Err(e) = server.initialize().await {
                warn!(server = %name, error = %e, "failed to initialize MCP server");
                let _ = server.shutdown().await;
                return None;
            }
            Some(Arc::new(server))
        });

        let servers = join_all(attempts).await.into_iter().flatten().collect();
        Self::new(servers)
    }

    /// The servers this host routes to.
    pub fn servers(&self) -> &[Arc<Server>] {
        &self.servers
    }

    /// Shut down every connected server.
    pub async fn shutdown(&self) {
        let connected = self
            .servers
            .iter()
            .filter(|s| s.status() == ServerStatus::Connected);
        let results = join_all(connected.map(|server| async move {
            (server.name().to_string(), server.shutdown().await)
        }))
        .await;
        for (name, result) in results {
            if let Err(e) = result {
                warn!(server = %name, error = %e, "error while disconnecting MCP server");
            }
        }
    }
}

impl ToolHost for McpToolHost {
    fn providers(&self) -> Vec<ToolProvider> {
        self.servers
            .iter()
            .map(|server| ToolProvider {
                name: server.name().to_string(),
                status: server.status().into(),
                tools: server
                    .tools()
                    .into_iter()
                    .map(ToolDescriptor::from)
                    .collect(),
            })
            .collect()
    }

    async fn call_tool(
        &self,
        call: &ToolCall,
        timeout: Duration,
    ) -> Result<Vec<ToolContent>, ToolError> {
        let server = self
            .servers
            .iter()
            .find(|s| s.name() == call.provider_name && s.status() == ServerStatus::Connected)
            .ok_or_else(|| ToolError::ProviderUnavailable(call.provider_name.clone()))?;

        debug!(
            server = %call.provider_name,
            tool = %call.tool_name,
            args = %call.args,
            "calling tool"
        );

        let result = server
            .call_tool(&call.tool_name, Some(call.args.clone()), timeout)
            .await?;
        Ok(result.content)
    }
}
