//! Conversation orchestration.
//!
//! One query is answered in at most two model turns. The first reply is
//! scanned for tool invocations; if there are none it is the answer.
//! Otherwise every call is dispatched, the results are sent back to the
//! model, and its second reply is the answer.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::{ChatRequest, LlmBackend, Message, Usage};
use crate::dispatch::Dispatcher;
use crate::parser::parse_tool_calls;
use crate::prompt::compose_system_prompt;
use crate::tools::{ToolHost, ToolResult};
use crate::Result;

/// Prefix of the message that hands tool results back to the model.
pub const RESULTS_PREAMBLE: &str = "Here are the results of the tool calls:\n\n";

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Composing,
    AwaitingFirstResponse,
    Parsing,
    NoCalls,
    Dispatching,
    AwaitingFinalResponse,
    Done,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnPhase::Composing => "composing",
            TurnPhase::AwaitingFirstResponse => "awaiting_first_response",
            TurnPhase::Parsing => "parsing",
            TurnPhase::NoCalls => "no_calls",
            TurnPhase::Dispatching => "dispatching",
            TurnPhase::AwaitingFinalResponse => "awaiting_final_response",
            TurnPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything that happened while answering one query.
#[derive(Debug, Clone)]
pub struct Turn {
    pub query: String,
    /// The model's first reply, exactly as received.
    pub first_response: String,
    /// Empty when the first reply requested no tools.
    pub tool_results: Vec<ToolResult>,
    pub answer: String,
    /// Tokens used across both model turns.
    pub usage: Usage,
}

impl Turn {
    pub fn used_tools(&self) -> bool {
        !self.tool_results.is_empty()
    }
}

/// Answers queries with a model and a set of tool providers.
pub struct Agent<B, H> {
    backend: B,
    host: H,
    dispatcher: Dispatcher,
}

impl<B: LlmBackend, H: ToolHost> Agent<B, H> {
    pub fn new(backend: B, host: H) -> Self {
        Self {
            backend,
            host,
            dispatcher: Dispatcher::default(),
        }
    }

    /// Override the per-call tool timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher = Dispatcher::new(timeout);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// The system prompt the next turn would use.
    pub fn system_prompt(&self) -> String {
        compose_system_prompt(&self.host.providers())
    }

    /// Answer `query`, returning only the final text.
    pub async fn process_query(&self, query: &str) -> Result<String> {
        Ok(self.run_turn(query).await?.answer)
    }

    /// Answer `query`, returning the full record of the turn.
    ///
    /// Backend failures end the turn with an error. Tool failures do not;
    /// they reach the model as error entries in the results.
    pub async fn run_turn(&self, query: &str) -> Result<Turn> {
        enter(TurnPhase::Composing);
        let system = self.system_prompt();

        enter(TurnPhase::AwaitingFirstResponse);
        let mut messages = vec![Message::user(query)];
        let first = self
            .backend
            .chat(ChatRequest {
                messages: &messages,
                system: Some(&system),
            })
            .await?;
        let mut usage = first.usage;

        enter(TurnPhase::Parsing);
        let calls = parse_tool_calls(&first.content);
        if calls.is_empty() {
            enter(TurnPhase::NoCalls);
            enter(TurnPhase::Done);
            return Ok(Turn {
                query: query.to_string(),
                answer: first.content.clone(),
                first_response: first.content,
                tool_results: Vec::new(),
                usage,
            });
        }

        enter(TurnPhase::Dispatching);
        info!(calls = calls.len(), "model requested tools");
        let tool_results = self.dispatcher.dispatch(&self.host, &calls).await;

        enter(TurnPhase::AwaitingFinalResponse);
        messages.push(Message::assistant(first.content.clone()));
        messages.push(Message::user(results_message(&tool_results)?));
        let last = self
            .backend
            .chat(ChatRequest {
                messages: &messages,
                system: Some(&system),
            })
            .await?;
        usage.input_tokens += last.usage.input_tokens;
        usage.output_tokens += last.usage.output_tokens;

        enter(TurnPhase::Done);
        Ok(Turn {
            query: query.to_string(),
            first_response: first.content,
            tool_results,
            answer: last.content,
            usage,
        })
    }
}

/// The user message carrying tool results back to the model.
pub fn results_message(results: &[ToolResult]) -> Result<String> {
    Ok(format!(
        "{RESULTS_PREAMBLE}{}",
        serde_json::to_string_pretty(results)?
    ))
}

fn enter(phase: TurnPhase) {
    debug!(%phase, "turn phase");
}
