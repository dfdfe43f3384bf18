//! Line-oriented JSON-RPC server loop.
//!
//! Requests are read one line at a time. Quick methods are answered
//! inline; each `tools/call` runs as a supervised task so a call waiting
//! for playback never stalls the read loop. All responses go through one
//! writer task, which owns the output stream.

use std::sync::Arc;

use aivis_coord::CompletionOutcome;
use aivis_runtime::TaskSupervisor;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backend::SpeechBackend;
use crate::error::McpServerError;
use crate::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::tool::{self, SpeechToolArgs, TOOL_NAME};

pub const SERVER_NAME: &str = "aivis-mcp";

#[derive(Debug, Clone)]
pub struct McpServer {
    backend: Arc<SpeechBackend>,
    tasks: TaskSupervisor,
}

impl McpServer {
    pub fn new(backend: SpeechBackend, tasks: TaskSupervisor) -> Self {
        Self {
            backend: Arc::new(backend),
            tasks,
        }
    }

    /// Serve on the process's stdin/stdout.
    pub async fn serve_stdio(&self) -> Result<(), McpServerError> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches EOF and every in-flight call has been
    /// answered.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), McpServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(rx, writer));

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(line, &tx) {
                // Writer gone means stdout is closed; stop reading.
                if tx.send(response).is_err() {
                    break;
                }
            }
        }
        debug!("Input closed; waiting for in-flight calls");

        drop(tx);
        match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(McpServerError::Io(std::io::Error::other(e))),
        }
    }

    fn handle_line(
        &self,
        line: &str,
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
    ) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Malformed JSON-RPC input");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };
        let id_hint = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id_hint,
                    INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                ));
            }
        };

        if request.is_notification() {
            Self::handle_notification(&request);
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(
                id,
                initialize_result(request.params.as_ref()),
            )),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(JsonRpcResponse::success(
                id,
                json!({ "tools": [tool::definition()] }),
            )),
            "tools/call" => self.start_tool_call(id, request.params, tx),
            other => {
                debug!(method = other, "Unknown method");
                Some(JsonRpcResponse::failure(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                ))
            }
        }
    }

    fn handle_notification(request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => info!("Client initialized"),
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    /// Validate a `tools/call` and, if it names our tool, answer it on a
    /// supervised task.
    fn start_tool_call(
        &self,
        id: Value,
        params: Option<Value>,
        tx: &mpsc::UnboundedSender<JsonRpcResponse>,
    ) -> Option<JsonRpcResponse> {
        let mut params = params.unwrap_or_else(|| json!({}));
        let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
        if name != TOOL_NAME {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                format!("Unknown tool: {name}"),
            ));
        }
        let arguments = params.get_mut("arguments").map(Value::take);

        let backend = Arc::clone(&self.backend);
        let tx = tx.clone();
        self.tasks.spawn("tools/call", async move {
            let result = call_speech_tool(&backend, arguments).await;
            tx.send(JsonRpcResponse::success(id, result))
                .map_err(|_| anyhow::anyhow!("response channel closed"))
        });
        None
    }
}

async fn call_speech_tool(backend: &SpeechBackend, arguments: Option<Value>) -> Value {
    let config = backend.config().current();
    let request = match SpeechToolArgs::from_value(arguments).and_then(|a| a.into_request(&config)) {
        Ok(request) => request,
        Err(message) => return tool::text_result(message, true),
    };

    match backend.submit(request).await {
        Ok(None | Some(CompletionOutcome::Completed)) => tool::text_result("OK", false),
        Ok(Some(CompletionOutcome::TimedOut { processing: true })) => {
            tool::text_result("Timed out waiting for playback; still playing", false)
        }
        Ok(Some(CompletionOutcome::TimedOut { processing: false })) => tool::text_result(
            "Timed out waiting for playback; the request may have failed",
            false,
        ),
        Err(e) => {
            error!(error = %e, "Speech request failed");
            tool::text_result(format!("Speech request failed: {e}"), true)
        }
    }
}

fn initialize_result(params: Option<&Value>) -> Value {
    let version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

async fn write_responses<W>(
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
    mut writer: W,
) -> Result<(), McpServerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let line = response.to_line()?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
