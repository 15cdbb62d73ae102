//! MCP JSON-RPC server over stdio.
//!
//! One JSON message per line. Each `tools/call` runs on its own task so a
//! slow provider does not block `ping` or cancellation; responses go
//! through a single writer task.

use std::{collections::HashMap, sync::Arc};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{Mutex, mpsc},
};
use tokio_util::sync::CancellationToken;
use weather_core::ToolRegistry;

/// MCP Protocol version
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "weather-mcp";

pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const JSONRPC_VERSION: &str = "2.0";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// JSON-RPC Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC Response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, result: Some(result), error: None }
    }

    pub fn error(id: Option<Value>, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message: message.to_string() }),
        }
    }
}

/// Key under which an in-flight call is tracked for cancellation.
fn request_key(id: &Value) -> String {
    id.to_string()
}

#[derive(Debug, Clone)]
pub struct ToolServer {
    registry: Arc<ToolRegistry>,
    in_flight: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry: Arc::new(registry), in_flight: Arc::new(Mutex::new(HashMap::new())) }
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            },
            "instructions": "Weather data from OpenWeather.\n\nAvailable tools:\n- get_current_weather: current conditions for a city\n- get_weather_forecast: daily forecast for 1-5 days\n- get_weather_alerts: active weather alerts for a city"
        })
    }

    fn handle_tools_list(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .definitions()
            .into_iter()
            .map(|def| {
                json!({
                    "name": def.name,
                    "description": def.description,
                    "inputSchema": def.input_schema,
                })
            })
            .collect();

        json!({ "tools": tools })
    }

    /// Track a call under its id before any of it runs, so a cancellation
    /// read right after the call always finds the token.
    async fn register_call(&self, id: Option<&Value>) -> CancellationToken {
        let cancel = CancellationToken::new();
        if let Some(id) = id {
            self.in_flight.lock().await.insert(request_key(id), cancel.clone());
        }
        cancel
    }

    /// Run a registered call and stop tracking it once it has answered.
    async fn run_tools_call(&self, request: JsonRpcRequest, cancel: CancellationToken) -> JsonRpcResponse {
        let result = self.handle_tools_call(request.params, cancel).await;

        if let Some(id) = &request.id {
            self.in_flight.lock().await.remove(&request_key(id));
        }

        match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(e) => JsonRpcResponse::error(request.id, INVALID_PARAMS, &e.to_string()),
        }
    }

    async fn handle_tools_call(&self, params: Value, cancel: CancellationToken) -> Result<Value, McpError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidParams("Missing tool name".to_string()))?;

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        debug!("Calling tool: {name} with args: {arguments}");

        let text = self
            .registry
            .dispatch(name, arguments, cancel)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?
            .await;

        Ok(json!({
            "content": [{
                "type": "text",
                "text": text
            }]
        }))
    }

    async fn handle_cancelled(&self, params: &Value) {
        let Some(id) = params.get("requestId") else {
            warn!("Cancellation notification without requestId");
            return;
        };

        match self.in_flight.lock().await.get(&request_key(id)) {
            Some(token) => {
                info!("Cancelling request {id}");
                token.cancel();
            }
            None => debug!("Cancellation for unknown or finished request {id}"),
        }
    }

    /// Handle a single JSON-RPC message. Notifications yield no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        if request.jsonrpc != JSONRPC_VERSION {
            warn!("Rejecting {} with jsonrpc version {:?}", request.method, request.jsonrpc);
            return request.id.map(|id| {
                JsonRpcResponse::error(
                    Some(id),
                    INVALID_REQUEST,
                    &format!("Invalid request: jsonrpc must be \"{JSONRPC_VERSION}\""),
                )
            });
        }

        match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(request.id, self.handle_initialize())),
            "initialized" | "notifications/initialized" => None,
            "notifications/cancelled" => {
                self.handle_cancelled(&request.params).await;
                None
            }
            "ping" => Some(JsonRpcResponse::success(request.id, json!({}))),
            "tools/list" => Some(JsonRpcResponse::success(request.id, self.handle_tools_list())),
            "tools/call" => {
                let cancel = self.register_call(request.id.as_ref()).await;
                Some(self.run_tools_call(request, cancel).await)
            }
            _ => {
                warn!("Unknown method: {}", request.method);
                Some(JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    &format!("Method not found: {}", request.method),
                ))
            }
        }
    }

    /// Run the MCP server over stdio
    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await?;
        Ok(())
    }

    /// Serve until `reader` is exhausted and every in-flight call has
    /// answered. Returns the writer. Stops early with the writer's error
    /// once responses can no longer be written.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> anyhow::Result<W>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = rx.recv().await {
                let response_json = serde_json::to_string(&response)?;
                debug!("Sending: {response_json}");
                writer.write_all(response_json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, anyhow::Error>(writer)
        });

        info!("MCP server ready, listening on stdio...");

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            debug!("Received: {line}");

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(e) => {
                    error!("Failed to parse request: {e}");
                    if tx.send(JsonRpcResponse::error(None, PARSE_ERROR, "Parse error")).is_err() {
                        error!("Response writer has stopped, closing input");
                        break;
                    }
                    continue;
                }
            };

            if request.method == "tools/call" && request.jsonrpc == JSONRPC_VERSION {
                let cancel = self.register_call(request.id.as_ref()).await;
                let server = self.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let response = server.run_tools_call(request, cancel).await;
                    if let Err(e) = tx.send(response) {
                        error!("Dropping response to {:?}, writer has stopped", e.0.id);
                    }
                });
            } else if let Some(response) = self.handle_request(request).await {
                if tx.send(response).is_err() {
                    error!("Response writer has stopped, closing input");
                    break;
                }
            }
        }

        info!("Input closed, waiting for in-flight calls");
        drop(tx);
        writer_task.await?
    }
}
