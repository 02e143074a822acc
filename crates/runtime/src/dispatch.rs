//! Concurrent execution of parsed tool calls.

use std::time::Duration;

use futures::future::join_all;
use mcp::ToolContent;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::registry::{ToolProvider, find_connected};
use crate::tools::{ToolCall, ToolError, ToolHost, ToolResult};

/// How long a single tool call may take before it is reported as failed.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs tool calls against a [`ToolHost`].
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every call concurrently and wait for all of them.
    ///
    /// Returns one result per call, in call order. A failing or slow call
    /// only affects its own result.
    pub async fn dispatch<H: ToolHost>(&self, host: &H, calls: &[ToolCall]) -> Vec<ToolResult> {
        let providers = host.providers();
        debug!(calls = calls.len(), "dispatching tool calls");
        join_all(calls.iter().map(|call| self.run(host, &providers, call))).await
    }

    async fn run<H: ToolHost>(
        &self,
        host: &H,
        providers: &[ToolProvider],
        call: &ToolCall,
    ) -> ToolResult {
        match self.execute(host, providers, call).await {
            Ok(content) => ToolResult::success(call, render_content(&content)),
            Err(e) => {
                warn!(
                    server = %call.provider_name,
                    tool = %call.tool_name,
                    error = %e,
                    "tool call failed"
                );
                ToolResult::error(call, e.to_string())
            }
        }
    }

    async fn execute<H: ToolHost>(
        &self,
        host: &H,
        providers: &[ToolProvider],
        call: &ToolCall,
    ) -> Result<Vec<ToolContent>, ToolError> {
        if find_connected(providers, &call.provider_name).is_none() {
            return Err(ToolError::ProviderUnavailable(call.provider_name.clone()));
        }

        tokio::time::timeout(self.timeout, host.call_tool(call, self.timeout))
            .await
            .map_err(|_| ToolError::timeout(self.timeout))?
    }
}

/// Flatten tool output into the text shown to the model.
///
/// Text blocks contribute their text and embedded resources their metadata
/// as pretty JSON, without the binary `blob`. Other kinds contribute
/// nothing. Non-empty pieces are separated by a blank line.
pub fn render_content(content: &[ToolContent]) -> String {
    content
        .iter()
        .filter_map(|item| match item {
            ToolContent::Text { text } => Some(text.clone()),
            ToolContent::Resource { resource } => Some(render_resource(resource)),
            ToolContent::Image { .. } | ToolContent::Unknown => None,
        })
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_resource(resource: &Map<String, Value>) -> String {
    let metadata: Map<String, Value> = resource
        .iter()
        .filter(|(key, _)| key.as_str() != "blob")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    serde_json::to_string_pretty(&metadata).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderStatus;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Host whose behavior is decided per tool name.
    struct ScriptedHost {
        providers: Vec<ToolProvider>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedHost {
        fn new(providers: Vec<ToolProvider>) -> Self {
            Self {
                providers,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ToolHost for ScriptedHost {
        fn providers(&self) -> Vec<ToolProvider> {
            self.providers.clone()
        }

        async fn call_tool(
            &self,
            call: &ToolCall,
            _timeout: Duration,
        ) -> Result<Vec<ToolContent>, ToolError> {
            self.calls.lock().unwrap().push(call.tool_name.clone());
            match call.tool_name.as_str() {
                "fail" => Err(ToolError::Execution("provider exploded".into())),
                "hang" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
                "slow" => {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(vec![ToolContent::text("slow done")])
                }
                other => Ok(vec![ToolContent::text(format!("{other} done"))]),
            }
        }
    }

    fn connected(name: &str) -> ToolProvider {
        ToolProvider::new(name, ProviderStatus::Connected)
    }

    fn call(provider: &str, tool: &str) -> ToolCall {
        ToolCall::new(provider, tool, json!({}))
    }

    #[test]
    fn render_text_and_resource() {
        let content: Vec<ToolContent> = serde_json::from_value(json!([
            {"type": "text", "text": "A"},
            {"type": "resource", "resource": {"uri": "x", "blob": "Zz=="}}
        ]))
        .unwrap();
        assert_eq!(render_content(&content), "A\n\n{\n  \"uri\": \"x\"\n}");
    }

    #[test]
    fn render_keeps_resource_metadata_order() {
        let content: Vec<ToolContent> = serde_json::from_value(json!([
            {"type": "resource", "resource": {
                "uri": "file:///notes.md",
                "mimeType": "text/markdown",
                "text": "# Notes"
            }}
        ]))
        .unwrap();
        assert_eq!(
            render_content(&content),
            "{\n  \"uri\": \"file:///notes.md\",\n  \"mimeType\": \"text/markdown\",\n  \"text\": \"# Notes\"\n}"
        );
    }

    #[test]
    fn render_skips_unknown_and_empty_items() {
        let content: Vec<ToolContent> = serde_json::from_value(json!([
            {"type": "image", "data": "AAAA", "mimeType": "image/png"},
            {"type": "text", "text": "first"},
            {"type": "audio", "data": "AAAA", "mimeType": "audio/wav"},
            {"type": "text", "text": ""},
            {"type": "text", "text": "second"}
        ]))
        .unwrap();
        assert_eq!(render_content(&content), "first\n\nsecond");
        assert_eq!(render_content(&[]), "");
    }

    #[tokio::test]
    async fn unknown_or_disconnected_provider_is_an_error_result() {
        let host = ScriptedHost::new(vec![ToolProvider::new(
            "weather-server",
            ProviderStatus::Disconnected,
        )]);
        let results = Dispatcher::default()
            .dispatch(
                &host,
                &[call("weather-server", "forecast"), call("nowhere", "forecast")],
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].error_message(),
            Some("no connected provider named weather-server")
        );
        assert!(results[0].result().is_none());
        assert_eq!(
            results[1].error_message(),
            Some("no connected provider named nowhere")
        );
        assert!(host.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let host = ScriptedHost::new(vec![connected("a"), connected("b")]);
        let calls = [call("a", "one"), call("b", "fail"), call("a", "two")];
        let results = Dispatcher::default().dispatch(&host, &calls).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].result(), Some("one done"));
        assert_eq!(results[1].error_message(), Some("provider exploded"));
        assert_eq!(results[2].result(), Some("two done"));
        assert_eq!(results.iter().filter(|r| r.is_error()).count(), 1);
    }

    #[tokio::test]
    async fn timeout_fails_only_the_hung_call() {
        let host = ScriptedHost::new(vec![connected("a")]);
        let dispatcher = Dispatcher::new(Duration::from_millis(50));
        let calls = [call("a", "hang"), call("a", "quick")];
        let results = dispatcher.dispatch(&host, &calls).await;

        assert_eq!(
            results[0].error_message(),
            Some("tool call timed out after 50ms")
        );
        assert_eq!(results[1].result(), Some("quick done"));
    }

    #[tokio::test]
    async fn calls_run_concurrently() {
        let host = ScriptedHost::new(vec![connected("a")]);
        let calls: Vec<_> = (0..5).map(|_| call("a", "slow")).collect();

        let started = Instant::now();
        let results = Dispatcher::default().dispatch(&host, &calls).await;

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.result() == Some("slow done")));
        assert!(started.elapsed() < Duration::from_millis(450));
    }

    #[tokio::test]
    async fn results_keep_provider_and_tool_names() {
        let host = ScriptedHost::new(vec![connected("weather-server")]);
        let results = Dispatcher::default()
            .dispatch(&host, &[call("weather-server", "get_forecast")])
            .await;
        assert_eq!(results[0].provider_name, "weather-server");
        assert_eq!(results[0].tool_name, "get_forecast");
    }

    #[tokio::test]
    async fn no_calls_no_results() {
        let host = ScriptedHost::new(Vec::new());
        assert!(Dispatcher::default().dispatch(&host, &[]).await.is_empty());
    }
}
