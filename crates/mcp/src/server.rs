//! MCP server management (spawn, communicate, lifecycle).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, IncomingMessage, InitializeParams, InitializeResult,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId, Tool,
};

/// Default timeout for MCP operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum output size (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Configuration for an MCP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Connection state of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Process started, handshake not finished.
    Connecting,
    /// Handshake finished; tools may be called.
    Connected,
    /// Handshake failed, the process exited, or the server was shut down.
    Disconnected,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

type Writer = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;
type Pending = Arc<std::sync::Mutex<HashMap<RequestId, oneshot::Sender<Result<JsonRpcResponse>>>>>;

/// Handle to a running MCP server.
///
/// Requests are multiplexed over one connection: a background task reads
/// the server's output and hands each response to the request with the
/// matching id, so concurrent calls do not wait on each other.
pub struct Server {
    name: String,
    process: Option<Mutex<Child>>,
    writer: Writer,
    pending: Pending,
    status: Arc<watch::Sender<ServerStatus>>,
    next_id: AtomicI64,
    server_info: RwLock<Option<InitializeResult>>,
    tools: RwLock<Vec<Tool>>,
    reader: JoinHandle<()>,
}

impl Server {
    /// Spawn a new MCP server process.
    pub async fn spawn(config: ServerConfig) -> Result<Self> {
        info!(
            server = %config.name,
            command = %config.command,
            args = ?config.args,
            "starting MCP server"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        let mut server = Self::connect_io(config.name, stdout, stdin);
        server.process = Some(Mutex::new(process));
        Ok(server)
    }

    /// Attach to a server over an already-open byte stream pair.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_io<R, W>(name: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let name = name.into();
        let writer: Writer = Arc::new(Mutex::new(Box::new(writer)));
        let pending: Pending = Arc::default();
        let (status, _) = watch::channel(ServerStatus::Connecting);
        let status = Arc::new(status);

        let reader = tokio::spawn(read_loop(
            name.clone(),
            reader,
            Arc::clone(&writer),
            Arc::clone(&pending),
            Arc::clone(&status),
        ));

        Self {
            name,
            process: None,
            writer,
            pending,
            status,
            next_id: AtomicI64::new(1),
            server_info: RwLock::new(None),
            tools: RwLock::new(Vec::new()),
            reader,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current connection state.
    pub fn status(&self) -> ServerStatus {
        *self.status.borrow()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// Initialize the server (must be called before other operations).
    ///
    /// Performs the handshake and fetches the tool list. On failure the
    /// server is marked disconnected.
    pub async fn initialize(&self) -> Result<&Self> {
        match self.handshake().await {
            Ok(()) => {
                self.status.send_replace(ServerStatus::Connected);
                info!(server = %self.name, tools = self.tool_count(), "MCP server connected");
                Ok(self)
            }
            Err(e) => {
                self.status.send_replace(ServerStatus::Disconnected);
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<()> {
        let params = InitializeParams::default();
        let result: InitializeResult = self
            .request("initialize", Some(params), DEFAULT_TIMEOUT)
            .await?;

        self.notify(JsonRpcNotification::new("notifications/initialized"))
            .await?;

        *self
            .server_info
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(result);

        self.refresh_tools().await
    }

    /// Get server info (after initialization).
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.server_info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Refresh the list of available tools.
    pub async fn refresh_tools(&self) -> Result<()> {
        let result: ListToolsResult = self
            .request("tools/list", None::<()>, DEFAULT_TIMEOUT)
            .await?;
        *self.tools.write().unwrap_or_else(PoisonError::into_inner) = result.tools;
        Ok(())
    }

    /// Get the list of available tools.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn tool_count(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Call a tool by name, waiting at most `wait` for the response.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        wait: Duration,
    ) -> Result<CallToolResult> {
        match self.status() {
            ServerStatus::Connected => {}
            ServerStatus::Connecting => return Err(Error::NotInitialized),
            ServerStatus::Disconnected => return Err(Error::ServerExited),
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params), wait).await?;

        // Check for error flag
        if result.is_error {
            let error_text = result
                .content
                .iter()
                .filter_map(|c| c.as_text())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(Error::ToolCallFailed(error_text));
        }

        Ok(result)
    }

    /// Shut down the server.
    pub async fn shutdown(&self) -> Result<()> {
        self.status.send_replace(ServerStatus::Disconnected);
        self.reader.abort();
        self.fail_pending();

        if let Some(process) = &self.process {
            let mut process = process.lock().await;
            // The process may already have exited on its own.
            let _ = process.kill().await;
        }

        info!(server = %self.name, "MCP server disconnected");
        Ok(())
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn fail_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>, wait: Duration) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), tx);

        // The reader clears the table when it stops; a request registered
        // after that would never be answered.
        if self.status() == ServerStatus::Disconnected {
            self.forget(&id);
            return Err(Error::ServerExited);
        }

        debug!(server = %self.name, %method, ?id, "sending request");
        if let Err(e) = write_line(&self.writer, &request).await {
            self.forget(&id);
            return Err(e);
        }

        let response = match timeout(wait, rx).await {
            Ok(Ok(response)) => response?,
            Ok(Err(_)) => return Err(Error::ServerExited),
            Err(_) => {
                self.forget(&id);
                return Err(Error::Timeout(wait));
            }
        };

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)?;

        Ok(result)
    }

    fn forget(&self, id: &RequestId) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    async fn notify(&self, notification: JsonRpcNotification) -> Result<()> {
        write_line(&self.writer, &notification).await
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}

async fn write_line(writer: &Writer, message: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string(message)?;
    let mut writer = writer.lock().await;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Route server output until the stream ends, then mark the server
/// disconnected and fail every outstanding request.
async fn read_loop<R>(
    name: String,
    reader: R,
    writer: Writer,
    pending: Pending,
    status: Arc<watch::Sender<ServerStatus>>,
) where
    R: AsyncRead + Send + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        // One byte over the limit is enough to tell an oversized line apart.
        let limit = MAX_OUTPUT_SIZE as u64 + 1;
        match (&mut reader).take(limit).read_until(b'\n', &mut line).await {
            Ok(0) => {
                debug!(server = %name, "server closed its output");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(server = %name, error = %e, "failed to read from server");
                break;
            }
        }

        if line.len() > MAX_OUTPUT_SIZE && line.last() != Some(&b'\n') {
            let skipped = match skip_line(&mut reader).await {
                Ok(skipped) => skipped,
                Err(e) => {
                    warn!(server = %name, error = %e, "failed to read from server");
                    break;
                }
            };
            let size = line.len() + skipped;
            warn!(server = %name, size, "server message exceeds size limit");
            if let Some(id) = leading_id(&line) {
                let waiter = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                if let Some(tx) = waiter {
                    let _ = tx.send(Err(Error::OutputTooLarge {
                        size,
                        max: MAX_OUTPUT_SIZE,
                    }));
                }
            }
            continue;
        }

        let Ok(text) = std::str::from_utf8(&line) else {
            debug!(server = %name, "ignoring non UTF-8 output");
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let message: IncomingMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                debug!(server = %name, error = %e, "ignoring non JSON-RPC output");
                continue;
            }
        };

        if let Some(method) = message.method.as_deref() {
            if let Some(id) = message.id.clone() {
                answer_server_request(&name, &writer, id, method).await;
            } else {
                debug!(server = %name, %method, "ignoring notification");
            }
            continue;
        }

        let Some(response) = message.into_response() else {
            continue;
        };
        let waiter = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&response.id);
        match waiter {
            // The requester may have timed out and gone away.
            Some(tx) => {
                let _ = tx.send(Ok(response));
            }
            None => debug!(server = %name, id = ?response.id, "response to unknown request"),
        }
    }

    status.send_replace(ServerStatus::Disconnected);
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

/// Discard input up to and including the next newline without buffering it.
/// Returns the number of bytes dropped.
async fn skip_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<usize> {
    let mut skipped = 0;
    loop {
        let (used, done) = {
            let buf = reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(skipped);
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            }
        };
        reader.consume(used);
        skipped += used;
        if done {
            return Ok(skipped);
        }
    }
}

/// Best-effort id of a truncated response. Servers write `id` ahead of
/// `result`, so the first unescaped `"id":` key is the envelope's.
fn leading_id(prefix: &[u8]) -> Option<RequestId> {
    const KEY: &[u8] = b"\"id\":";
    let at = prefix
        .windows(KEY.len())
        .enumerate()
        .find(|&(i, w)| w == KEY && (i == 0 || prefix[i - 1] != b'\\'))
        .map(|(i, _)| i + KEY.len())?;
    let mut values = serde_json::Deserializer::from_slice(&prefix[at..]).into_iter::<RequestId>();
    values.next()?.ok()
}

/// Reply to a request initiated by the server. Only `ping` is supported.
async fn answer_server_request(name: &str, writer: &Writer, id: RequestId, method: &str) {
    let reply = if method == "ping" {
        serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": {} })
    } else {
        debug!(server = %name, %method, "rejecting unsupported server request");
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": format!("method not found: {method}") }
        })
    };
    if let Err(e) = write_line(writer, &reply).await {
        warn!(server = %name, error = %e, "failed to answer server request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, DuplexStream, ReadHalf, WriteHalf};

    /// Server side of an in-memory connection.
    struct FakeServer {
        lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
        out: WriteHalf<DuplexStream>,
    }

    impl FakeServer {
        async fn next(&mut self) -> Option<Value> {
            let line = self.lines.next_line().await.ok()??;
            serde_json::from_str(&line).ok()
        }

        async fn send(&mut self, value: Value) {
            let mut text = value.to_string();
            text.push('\n');
            self.out.write_all(text.as_bytes()).await.unwrap();
            self.out.flush().await.unwrap();
        }

        async fn reply(&mut self, request: &Value, result: Value) {
            self.send(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
                .await;
        }

        /// Answer the handshake and a tools/list with one tool.
        async fn handshake(&mut self) {
            let init = self.next().await.unwrap();
            assert_eq!(init["method"], "initialize");
            self.reply(
                &init,
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "fake", "version": "1.0.0" }
                }),
            )
            .await;

            let initialized = self.next().await.unwrap();
            assert_eq!(initialized["method"], "notifications/initialized");
            assert!(initialized.get("id").is_none());

            let list = self.next().await.unwrap();
            assert_eq!(list["method"], "tools/list");
            self.reply(
                &list,
                json!({ "tools": [{
                    "name": "echo",
                    "description": "Echo the input",
                    "inputSchema": { "type": "object" }
                }]}),
            )
            .await;
        }
    }

    fn pair() -> (Server, FakeServer) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);
        let conn = Server::connect_io("fake", client_read, client_write);
        let fake = FakeServer {
            lines: BufReader::new(server_read).lines(),
            out: server_write,
        };
        (conn, fake)
    }

    #[test]
    fn server_config_creation() {
        let config = ServerConfig {
            name: "test".to_string(),
            command: "echo".to_string(),
            args: vec!["hello".to_string()],
            env: HashMap::new(),
        };
        assert_eq!(config.name, "test");
    }

    #[test]
    fn status_display() {
        assert_eq!(ServerStatus::Connecting.to_string(), "connecting");
        assert_eq!(ServerStatus::Connected.to_string(), "connected");
        assert_eq!(ServerStatus::Disconnected.to_string(), "disconnected");
    }

    #[tokio::test]
    async fn initialize_connects_and_lists_tools() {
        let (server, mut fake) = pair();
        assert_eq!(server.status(), ServerStatus::Connecting);

        let fake_task = tokio::spawn(async move {
            fake.handshake().await;
            fake
        });
        server.initialize().await.unwrap();
        let _fake = fake_task.await.unwrap();

        assert_eq!(server.status(), ServerStatus::Connected);
        assert_eq!(server.server_info().unwrap().server_info.name, "fake");
        let tools = server.tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
    }

    #[tokio::test]
    async fn call_before_initialize_is_rejected() {
        let (server, _fake) = pair();
        let err = server
            .call_tool("echo", None, DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[tokio::test]
    async fn concurrent_calls_are_matched_by_id() {
        let (server, mut fake) = pair();
        let fake_task = tokio::spawn(async move {
            fake.handshake().await;
            // Collect both calls, then answer them in reverse order.
            let first = fake.next().await.unwrap();
            let second = fake.next().await.unwrap();
            for request in [&second, &first] {
                let text = request["params"]["arguments"]["text"].clone();
                fake.reply(request, json!({ "content": [{ "type": "text", "text": text }] }))
                    .await;
            }
            fake
        });
        server.initialize().await.unwrap();

        let (a, b) = tokio::join!(
            server.call_tool("echo", Some(json!({ "text": "a" })), DEFAULT_TIMEOUT),
            server.call_tool("echo", Some(json!({ "text": "b" })), DEFAULT_TIMEOUT),
        );
        let _fake = fake_task.await.unwrap();

        assert_eq!(a.unwrap().content[0].as_text(), Some("a"));
        assert_eq!(b.unwrap().content[0].as_text(), Some("b"));
    }

    #[tokio::test]
    async fn error_flag_becomes_tool_call_failed() {
        let (server, mut fake) = pair();
        let fake_task = tokio::spawn(async move {
            fake.handshake().await;
            let call = fake.next().await.unwrap();
            fake.reply(
                &call,
                json!({ "content": [{ "type": "text", "text": "city not found" }], "isError": true }),
            )
            .await;
            fake
        });
        server.initialize().await.unwrap();

        let err = server
            .call_tool("echo", Some(json!({})), DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        let _fake = fake_task.await.unwrap();

        assert!(matches!(err, Error::ToolCallFailed(_)));
        assert_eq!(err.to_string(), "city not found");
    }

    #[tokio::test]
    async fn json_rpc_error_is_returned() {
        let (server, mut fake) = pair();
        let fake_task = tokio::spawn(async move {
            fake.handshake().await;
            let call = fake.next().await.unwrap();
            fake.send(json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "error": { "code": -32602, "message": "unknown tool" }
            }))
            .await;
            fake
        });
        server.initialize().await.unwrap();

        let err = server
            .call_tool("missing", None, DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        let _fake = fake_task.await.unwrap();

        assert_eq!(err.to_string(), "JSON-RPC error: [-32602] unknown tool");
    }

    #[tokio::test]
    async fn unanswered_call_times_out() {
        let (server, mut fake) = pair();
        let fake_task = tokio::spawn(async move {
            fake.handshake().await;
            let _ignored = fake.next().await.unwrap();
            fake
        });
        server.initialize().await.unwrap();

        let err = server
            .call_tool("echo", None, Duration::from_millis(50))
            .await
            .unwrap_err();
        let _fake = fake_task.await.unwrap();

        assert!(matches!(err, Error::Timeout(_)));
        assert!(server.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_stream_disconnects_and_fails_pending_calls() {
        let (server, mut fake) = pair();
        let mut status = server.subscribe();
        let fake_task = tokio::spawn(async move {
            fake.handshake().await;
            let _call = fake.next().await.unwrap();
            // Dropping both halves closes the connection.
            drop(fake);
        });
        server.initialize().await.unwrap();

        let err = server
            .call_tool("echo", None, DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        fake_task.await.unwrap();

        assert!(matches!(err, Error::ServerExited));
        status
            .wait_for(|s| *s == ServerStatus::Disconnected)
            .await
            .unwrap();
        assert_eq!(server.status(), ServerStatus::Disconnected);
    }

    #[tokio::test]
    async fn server_ping_is_answered() {
        let (server, mut fake) = pair();
        fake.send(json!({ "jsonrpc": "2.0", "id": "srv-1", "method": "ping" }))
            .await;
        let reply = fake.next().await.unwrap();
        assert_eq!(reply["id"], "srv-1");
        assert_eq!(reply["result"], json!({}));
        assert_eq!(server.status(), ServerStatus::Connecting);
    }

    #[tokio::test]
    async fn shutdown_marks_disconnected() {
        let (server, _fake) = pair();
        server.shutdown().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Disconnected);
        let err = server
            .call_tool("echo", None, DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ServerExited));
    }

    #[tokio::test]
    async fn non_utf8_output_is_skipped() {
        let (server, mut fake) = pair();
        fake.out.write_all(b"caf\xe9 starting\n").await.unwrap();
        let fake_task = tokio::spawn(async move {
            fake.handshake().await;
            fake
        });
        server.initialize().await.unwrap();
        let _fake = fake_task.await.unwrap();

        assert_eq!(server.status(), ServerStatus::Connected);
    }

    #[tokio::test]
    async fn oversized_response_fails_only_its_call() {
        let (server, mut fake) = pair();
        let fake_task = tokio::spawn(async move {
            fake.handshake().await;
            let big = fake.next().await.unwrap();
            let text = "x".repeat(MAX_OUTPUT_SIZE + 16);
            fake.reply(&big, json!({ "content": [{ "type": "text", "text": text }] }))
                .await;
            let small = fake.next().await.unwrap();
            fake.reply(&small, json!({ "content": [{ "type": "text", "text": "ok" }] }))
                .await;
            fake
        });
        server.initialize().await.unwrap();

        let err = server
            .call_tool("echo", None, DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::OutputTooLarge {
                max: MAX_OUTPUT_SIZE,
                ..
            }
        ));

        let ok = server
            .call_tool("echo", None, DEFAULT_TIMEOUT)
            .await
            .unwrap();
        let _fake = fake_task.await.unwrap();
        assert_eq!(ok.content[0].as_text(), Some("ok"));
        assert_eq!(server.status(), ServerStatus::Connected);
    }

    #[test]
    fn leading_id_reads_envelope_id() {
        assert_eq!(
            leading_id(br#"{"jsonrpc":"2.0","id":7,"result":{"content":[{"te"#),
            Some(RequestId::Number(7))
        );
        assert_eq!(
            leading_id(br#"{"id": "abc","result""#),
            Some(RequestId::String("abc".into()))
        );
        assert_eq!(leading_id(br#"{"text":"say \"id\": 3"#), None);
    }
}
