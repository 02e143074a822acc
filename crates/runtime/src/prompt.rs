//! System prompt composition.

use std::fmt::Write;

use serde_json::json;

use crate::parser::{self, ARGUMENTS, SERVER_NAME, TOOL_NAME, USE_TOOL};
use crate::registry::{ToolDescriptor, ToolProvider};
use crate::tools::ToolCall;

const PREAMBLE: &str = "You are a helpful AI assistant with access to MCP servers.\n\n\
When you need external data or functionality, request the appropriate MCP tool.";

const NO_SERVERS: &str = "(No MCP servers currently connected)";

/// Build the system prompt describing the invocation syntax and every
/// connected provider's tools.
///
/// Providers that are not connected are left out.
pub fn compose_system_prompt(providers: &[ToolProvider]) -> String {
    let mut prompt = String::new();
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\n");
    prompt.push_str(&invocation_syntax());
    prompt.push_str("\n\n====\n\nMCP SERVERS\n\n");
    prompt.push_str(
        "The Model Context Protocol (MCP) connects you to locally running servers \
         that provide additional tools.\n\n",
    );
    prompt.push_str("# Connected MCP Servers\n\n");
    let _ = writeln!(
        prompt,
        "Tools of a connected server are available through `{}`.\n",
        USE_TOOL.name
    );

    let sections: Vec<String> = providers
        .iter()
        .filter(|p| p.is_connected())
        .map(provider_section)
        .collect();

    if sections.is_empty() {
        prompt.push_str(NO_SERVERS);
    } else {
        prompt.push_str(&sections.join("\n\n"));
    }
    prompt.push('\n');
    prompt
}

fn invocation_syntax() -> String {
    let template = format!(
        "{}\n{}server name here{}\n{}tool name here{}\n{}\n{{\n  \"param1\": \"value1\",\n  \"param2\": \"value2\"\n}}\n{}\n{}",
        USE_TOOL.open,
        SERVER_NAME.open,
        SERVER_NAME.close,
        TOOL_NAME.open,
        TOOL_NAME.close,
        ARGUMENTS.open,
        ARGUMENTS.close,
        USE_TOOL.close,
    );
    let example = parser::render_tool_call(&ToolCall::new(
        "weather-server",
        "get_forecast",
        json!({ "city": "Gold Coast", "days": 5 }),
    ));

    format!(
        "## {use_tool}\n\
         Description: Request a tool provided by a connected MCP server.\n\
         Parameters:\n\
         - {server}: (required) Name of the MCP server providing the tool\n\
         - {tool}: (required) Name of the tool to run\n\
         - {args}: (required) JSON object with the tool's input parameters\n\
         \n\
         Usage:\n{template}\n\nExample:\n{example}",
        use_tool = USE_TOOL.name,
        server = SERVER_NAME.name,
        tool = TOOL_NAME.name,
        args = ARGUMENTS.name,
    )
}

fn provider_section(provider: &ToolProvider) -> String {
    let tools: Vec<String> = provider.tools.iter().map(tool_entry).collect();
    format!(
        "## {}\n\n### Available Tools\n{}",
        provider.name,
        tools.join("\n\n")
    )
}

fn tool_entry(tool: &ToolDescriptor) -> String {
    let description = tool
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("No description");
    let mut entry = format!("- {}: {description}", tool.name);
    if let Some(schema) = &tool.input_schema {
        let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        entry.push_str("\n    Input Schema:");
        for line in pretty.lines() {
            entry.push_str("\n    ");
            entry.push_str(line);
        }
    }
    entry
}
