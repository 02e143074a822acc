//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for communicating with MCP servers via stdio.
//! Each [`Server`] owns one child process; requests to it may be issued
//! concurrently and are matched to responses by JSON-RPC id.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Server, ServerConfig, DEFAULT_TIMEOUT};
//! use std::collections::HashMap;
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig {
//!     name: "filesystem".to_string(),
//!     command: "mcp-server-filesystem".to_string(),
//!     args: vec!["./workspace".to_string()],
//!     env: HashMap::new(),
//! };
//!
//! let server = Server::spawn(config).await?;
//! server.initialize().await?;
//!
//! for tool in server.tools() {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = server
//!     .call_tool(
//!         "read_file",
//!         Some(serde_json::json!({ "path": "./README.md" })),
//!         DEFAULT_TIMEOUT,
//!     )
//!     .await?;
//! println!("{} content blocks", result.content.len());
//!
//! server.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod server;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, IncomingMessage, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    RequestId, ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use server::{DEFAULT_TIMEOUT, MAX_OUTPUT_SIZE, Server, ServerConfig, ServerStatus};
