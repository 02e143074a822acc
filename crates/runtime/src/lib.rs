//! Purser runtime: tool-call orchestration between a language model and
//! MCP tool providers.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **LlmBackend**: a trait abstracting model providers (Anthropic,
//!   OpenAI-compatible APIs such as DeepSeek).
//! - **ToolHost**: a trait abstracting whoever owns the tool providers;
//!   [`McpToolHost`] routes calls to MCP servers.
//! - **Agent**: answers a query in at most two model turns, running any
//!   tool calls the model asks for in between.
//!
//! # Example
//!
//! ```no_run
//! use runtime::{Agent, McpToolHost, OpenAiCompatibleBackend, DEEPSEEK_MODEL};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = OpenAiCompatibleBackend::builder("sk-...", DEEPSEEK_MODEL).build();
//! let host = McpToolHost::connect(Vec::new()).await;
//!
//! let agent = Agent::new(backend, host);
//! let answer = agent.process_query("What's the weather in Gold Coast?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

mod agent;
pub mod backend;
mod dispatch;
mod error;
pub mod parser;
mod prompt;
pub mod registry;
pub mod tools;

pub use agent::{Agent, RESULTS_PREAMBLE, Turn, TurnPhase, results_message};

pub use backend::{
    AnthropicBackend, ChatRequest, ChatResponse, DEEPSEEK_BASE_URL, DEEPSEEK_MODEL,
    LlmBackend, Message, OpenAiCompatibleBackend, Role, Usage,
};

pub use dispatch::{DEFAULT_TOOL_TIMEOUT, Dispatcher, render_content};

pub use error::{Error, Result};

pub use parser::{parse_tool_calls, render_tool_call};

pub use prompt::compose_system_prompt;

pub use registry::{ProviderStatus, ToolDescriptor, ToolProvider, find_connected};

pub use tools::{McpToolHost, ToolCall, ToolError, ToolHost, ToolOutcome, ToolResult};
