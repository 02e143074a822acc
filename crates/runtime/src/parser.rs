//! Extraction of tool invocations from model output.
//!
//! The model requests tools by embedding blocks like this anywhere in its
//! reply:
//!
//! ```text
//! <use_mcp_tool>
//! <server_name>weather-server</server_name>
//! <tool_name>get_forecast</tool_name>
//! <arguments>
//! {"city": "Gold Coast", "days": 5}
//! </arguments>
//! </use_mcp_tool>
//! ```
//!
//! The grammar is flat and fixed, so blocks are found by scanning for tag
//! boundaries rather than with a markup parser.

use crate::tools::ToolCall;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// A pair of opening and closing tags.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub name: &'static str,
    pub open: &'static str,
    pub close: &'static str,
}

pub const USE_TOOL: Tag = Tag {
    name: "use_mcp_tool",
    open: "<use_mcp_tool>",
    close: "</use_mcp_tool>",
};
pub const SERVER_NAME: Tag = Tag {
    name: "server_name",
    open: "<server_name>",
    close: "</server_name>",
};
pub const TOOL_NAME: Tag = Tag {
    name: "tool_name",
    open: "<tool_name>",
    close: "</tool_name>",
};
pub const ARGUMENTS: Tag = Tag {
    name: "arguments",
    open: "<arguments>",
    close: "</arguments>",
};

/// Why a block was rejected.
#[derive(Debug, Error)]
enum BlockError {
    #[error("missing <{0}> (fields must appear as server_name, tool_name, arguments)")]
    Missing(&'static str),
    #[error("empty <{0}>")]
    Empty(&'static str),
    #[error("arguments are not valid JSON: {0}")]
    InvalidArguments(#[from] serde_json::Error),
    #[error("no </{0}> after the arguments")]
    Unterminated(&'static str),
}

/// Parse every well-formed tool invocation in `text`, in order of appearance.
///
/// Malformed blocks are skipped; they never affect the other blocks. Text
/// without any block yields an empty vector.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(USE_TOOL.open) {
        let body = &rest[start + USE_TOOL.open.len()..];
        let Some(fence) = body.find(USE_TOOL.close) else {
            break;
        };
        match parse_block(body, fence) {
            Ok((call, after)) => {
                calls.push(call);
                rest = after;
            }
            Err(e) => {
                debug!(reason = %e, "skipping malformed tool call block");
                rest = &body[fence + USE_TOOL.close.len()..];
            }
        }
    }

    calls
}

/// Render a call in the wire syntax understood by [`parse_tool_calls`].
pub fn render_tool_call(call: &ToolCall) -> String {
    let args = serde_json::to_string_pretty(&call.args).unwrap_or_else(|_| call.args.to_string());
    format!(
        "{}\n{}{}{}\n{}{}{}\n{}\n{args}\n{}\n{}",
        USE_TOOL.open,
        SERVER_NAME.open,
        call.provider_name,
        SERVER_NAME.close,
        TOOL_NAME.open,
        call.tool_name,
        TOOL_NAME.close,
        ARGUMENTS.open,
        ARGUMENTS.close,
        USE_TOOL.close,
    )
}

/// Find the first `tag` element in `text`, returning its body and the text
/// after its closing tag. The body ends at the first closing tag.
fn take_element(text: &str, tag: Tag) -> Option<(&str, &str)> {
    let start = text.find(tag.open)? + tag.open.len();
    let len = text[start..].find(tag.close)?;
    let end = start + len;
    Some((&text[start..end], &text[end + tag.close.len()..]))
}

/// Parse the block whose body starts at `body`, returning the call and the
/// text after the block.
///
/// `fence` is the first closing tag in `body`. The names and the opening
/// `<arguments>` must come before it, but the arguments run to the first
/// `</arguments>` and may themselves contain a closing tag. The block ends
/// at the first closing tag after the arguments.
fn parse_block(body: &str, fence: usize) -> Result<(ToolCall, &str), BlockError> {
    let head = &body[..fence];
    let (server, rest) =
        take_element(head, SERVER_NAME).ok_or(BlockError::Missing(SERVER_NAME.name))?;
    let (tool, rest) = take_element(rest, TOOL_NAME).ok_or(BlockError::Missing(TOOL_NAME.name))?;
    let args_at = rest
        .find(ARGUMENTS.open)
        .ok_or(BlockError::Missing(ARGUMENTS.name))?;

    // `rest` is a suffix of `head`, which is a prefix of `body`.
    let tail = &body[head.len() - rest.len() + args_at..];
    let (args, after) = take_element(tail, ARGUMENTS).ok_or(BlockError::Missing(ARGUMENTS.name))?;
    let end = after
        .find(USE_TOOL.close)
        .ok_or(BlockError::Unterminated(USE_TOOL.name))?;

    let server = non_empty(server, SERVER_NAME)?;
    let tool = non_empty(tool, TOOL_NAME)?;
    let args: Value = serde_json::from_str(args.trim())?;

    let call = ToolCall::new(server, tool, args);
    Ok((call, &after[end + USE_TOOL.close.len()..]))
}

fn non_empty(field: &str, tag: Tag) -> Result<&str, BlockError> {
    let field = field.trim();
    if field.is_empty() {
        Err(BlockError::Empty(tag.name))
    } else {
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FORECAST: &str = "<use_mcp_tool>
<server_name>weather-server</server_name>
<tool_name>get_forecast</tool_name>
<arguments>
{
  \"city\": \"Gold Coast\",
  \"days\": 5
}
</arguments>
</use_mcp_tool>";

    #[test]
    fn no_blocks_yields_no_calls() {
        assert!(parse_tool_calls("The capital of France is Paris.").is_empty());
        assert!(parse_tool_calls("").is_empty());
    }

    #[test]
    fn parses_block_embedded_in_prose() {
        let text = format!("Let me check the forecast.\n\n{FORECAST}\n\nOne moment.");
        let calls = parse_tool_calls(&text);
        assert_eq!(
            calls,
            vec![ToolCall::new(
                "weather-server",
                "get_forecast",
                json!({"city": "Gold Coast", "days": 5})
            )]
        );
    }

    #[test]
    fn rendered_call_parses_back() {
        let call = ToolCall::new(
            "github-server",
            "search_repositories",
            json!({"query": "tokio <async>", "page": 2, "filters": {"archived": false}}),
        );
        assert_eq!(parse_tool_calls(&render_tool_call(&call)), vec![call]);
    }

    #[test]
    fn tolerates_whitespace_inside_and_between_tags() {
        let text = "<use_mcp_tool>   <server_name>\n  weather-server \n</server_name>\n\n\t<tool_name> get_forecast</tool_name>   <arguments>{\"days\":1}</arguments>\n</use_mcp_tool>";
        let calls = parse_tool_calls(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].provider_name, "weather-server");
        assert_eq!(calls[0].tool_name, "get_forecast");
        assert_eq!(calls[0].args, json!({"days": 1}));
    }

    #[test]
    fn keeps_order_and_duplicates() {
        let other = render_tool_call(&ToolCall::new("search", "web", json!({"q": "rust"})));
        let text = format!("{FORECAST}\n{other}\n{FORECAST}");
        let calls = parse_tool_calls(&text);
        let tools: Vec<_> = calls.iter().map(|c| c.tool_name.as_str()).collect();
        assert_eq!(tools, ["get_forecast", "web", "get_forecast"]);
        assert_eq!(calls[0], calls[2]);
    }

    #[test]
    fn invalid_json_drops_only_that_block() {
        let broken = FORECAST.replace("\"days\": 5", "\"days\": ");
        let text = format!("{FORECAST}\n{broken}\n{FORECAST}");
        assert_eq!(parse_tool_calls(&text).len(), 2);
    }

    #[test]
    fn missing_field_drops_block() {
        let text = "<use_mcp_tool><server_name>a</server_name><arguments>{}</arguments></use_mcp_tool>";
        assert!(parse_tool_calls(text).is_empty());
        let body = "<server_name>a</server_name><arguments>{}</arguments></use_mcp_tool>";
        let fence = body.find(USE_TOOL.close).unwrap();
        assert!(matches!(
            parse_block(body, fence),
            Err(BlockError::Missing("tool_name"))
        ));
    }

    #[test]
    fn empty_names_drop_block() {
        let text = "<use_mcp_tool><server_name> </server_name><tool_name>t</tool_name><arguments>{}</arguments></use_mcp_tool>";
        assert!(parse_tool_calls(text).is_empty());
    }

    #[test]
    fn out_of_order_fields_drop_block() {
        let text = "<use_mcp_tool><tool_name>t</tool_name><server_name>s</server_name><arguments>{}</arguments></use_mcp_tool>";
        assert!(parse_tool_calls(text).is_empty());
    }

    #[test]
    fn unterminated_block_is_ignored() {
        let text = format!("{FORECAST}\n<use_mcp_tool><server_name>s</server_name>");
        assert_eq!(parse_tool_calls(&text).len(), 1);
    }

    #[test]
    fn missing_block_close_tag_is_ignored() {
        let text = "<use_mcp_tool><server_name>s</server_name><tool_name>t</tool_name><arguments>{}</arguments>";
        assert!(parse_tool_calls(text).is_empty());
    }

    #[test]
    fn non_object_arguments_are_kept() {
        let text = "<use_mcp_tool><server_name>s</server_name><tool_name>t</tool_name><arguments>[1, 2]</arguments></use_mcp_tool>";
        assert_eq!(parse_tool_calls(text)[0].args, json!([1, 2]));
    }

    #[test]
    fn closing_tag_inside_arguments_is_kept() {
        let call = ToolCall::new(
            "fs",
            "write_file",
            json!({"content": "Use </use_mcp_tool> to end a block"}),
        );
        let text = format!("{}\n{FORECAST}", render_tool_call(&call));
        let calls = parse_tool_calls(&text);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], call);
        assert_eq!(calls[1].tool_name, "get_forecast");
    }

    #[test]
    fn opening_tag_inside_arguments_is_not_a_block() {
        let call = ToolCall::new(
            "fs",
            "write_file",
            json!({"content": "<use_mcp_tool><server_name>x</server_name>"}),
        );
        assert_eq!(parse_tool_calls(&render_tool_call(&call)), vec![call]);
    }

    #[test]
    fn malformed_block_does_not_swallow_the_next() {
        let broken = "<use_mcp_tool><server_name>a</server_name><arguments>{}</arguments></use_mcp_tool>";
        let text = format!("{broken}\n{FORECAST}");
        let calls = parse_tool_calls(&text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].provider_name, "weather-server");
    }

    #[test]
    fn arguments_without_block_close_are_dropped() {
        let text = "<use_mcp_tool><server_name>s</server_name><tool_name>t</tool_name>\
                    <arguments>{\"a\": \"</use_mcp_tool>\"}</arguments>";
        assert!(parse_tool_calls(text).is_empty());
    }
}
