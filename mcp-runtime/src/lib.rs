//! Model Context Protocol server exposing Google Search Console as tools.

use std::io;
use std::sync::Arc;

use gsc_core::{AuthError, AuthSessionProvider, Config};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

pub mod config;
pub mod date;
pub mod dispatch;
pub mod errors;
pub mod format;
pub mod registry;
pub mod search_console;
pub mod tools;
pub mod util;
pub mod validate;

pub use config::ConfigArgs;
pub use dispatch::{Dispatcher, ResponseEnvelope};
pub use registry::ToolRegistry;
pub use search_console::{SearchConsoleApi, SearchConsoleClient, UpstreamError};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "gsc-mcp-server";

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Failed to read MCP message: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to write MCP response: {0}")]
    Write(#[source] io::Error),
}

impl ServeError {
    pub fn code(&self) -> &'static str {
        match self {
            ServeError::Auth(err) => err.code(),
            ServeError::Read(_) => "stdio_read_failure",
            ServeError::Write(_) => "stdio_write_failure",
        }
    }
}

/// Resolve the auth session for `config` and serve tools over stdio until
/// the client closes the stream.
pub async fn serve(config: &Config) -> Result<(), ServeError> {
    let http = util::client();
    let session = AuthSessionProvider::new(config, http.clone())
        .resolve()
        .await?;
    tracing::info!(
        mode = session.mode().as_str(),
        default_site = config.default_site().unwrap_or("-"),
        "Starting {MCP_SERVER_NAME}"
    );

    let api = SearchConsoleClient::new(http, Arc::new(session));
    let dispatcher = Dispatcher::new(Arc::new(api), config.default_site().map(str::to_string));
    McpServer::new(dispatcher).serve_stdio().await
}

/// Wire framing of an inbound message; replies use the same framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    ContentLength,
    Line,
}

struct Inbound {
    framing: Framing,
    payload: Result<Value, String>,
}

impl Inbound {
    fn parse(body: &[u8], framing: Framing) -> Self {
        Self {
            framing,
            payload: serde_json::from_slice(body).map_err(|e| format!("Parse error: {e}")),
        }
    }
}

#[derive(Clone)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub async fn serve_stdio(&self) -> Result<(), ServeError> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Every inbound message is handled on its own task; a single writer task
    /// serializes the replies.
    pub async fn serve<R, W>(&self, mut reader: R, writer: W) -> Result<(), ServeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<(Value, Framing)>();
        let writer_task = tokio::spawn(write_loop(writer, rx));

        let read_result = loop {
            let inbound = match read_message(&mut reader).await {
                Ok(Some(inbound)) => inbound,
                Ok(None) => break Ok(()),
                Err(e) => break Err(ServeError::Read(e)),
            };
            if tx.is_closed() {
                break Ok(());
            }

            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let framing = inbound.framing;
                let response = match inbound.payload {
                    Ok(message) => server.handle_incoming_message(message).await,
                    Err(reason) => Some(error_response(Value::Null, RpcError::parse_error(reason))),
                };
                if let Some(response) = response {
                    let _ = tx.send((response, framing));
                }
            });
        };
        drop(tx);

        let write_result = writer_task
            .await
            .map_err(|e| ServeError::Write(io::Error::other(e)))?;
        read_result?;
        write_result
    }

    async fn handle_incoming_message(&self, incoming: Value) -> Option<Value> {
        let Some(batch) = incoming.as_array() else {
            return self.handle_single_message(incoming).await;
        };
        if batch.is_empty() {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
        }

        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = self.handle_single_message(item.clone()).await {
                responses.push(response);
            }
        }
        (!responses.is_empty()).then_some(Value::Array(responses))
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        // No method: a client response; the server never issues requests.
        let method = obj.get("method").and_then(Value::as_str)?;

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => Some(match self.handle_request(method, params).await {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            }),
            None => {
                tracing::debug!(method, "Notification received");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.dispatcher.registry().list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let arguments = params.get("arguments");
        if arguments.is_some_and(|args| !args.is_object() && !args.is_null()) {
            return Err(RpcError::invalid_params(
                "tools/call 'arguments' must be an object",
            ));
        }

        let envelope = self.dispatcher.dispatch(name, arguments).await;
        Ok(envelope.to_call_result())
    }
}

fn initialize_payload() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            },
            "resources": {
                "listChanged": false
            },
            "prompts": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl RpcError {
    fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: Some(json!({ "method": method })),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

/// Reads one message in either framing. A line that opens with `{` or `[`
/// (or is not a `Name: value` header) is a newline-delimited message;
/// anything else starts a `Content-Length` header block.
async fn read_message<R>(reader: &mut R) -> Result<Option<Inbound>, io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if !in_headers {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if in_headers && line.is_empty() {
            break;
        }
        if !in_headers {
            let body = line.trim();
            if body.is_empty() {
                continue;
            }
            if body.starts_with('{') || body.starts_with('[') || !body.contains(':') {
                return Ok(Some(Inbound::parse(body.as_bytes(), Framing::Line)));
            }
            in_headers = true;
        }

        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            let parsed = value.trim().parse::<usize>().map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "Invalid Content-Length header")
            })?;
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length header")
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Inbound::parse(&payload, Framing::ContentLength)))
}

async fn write_message<W>(writer: &mut W, value: &Value, framing: Framing) -> Result<(), io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<(Value, Framing)>,
) -> Result<(), ServeError>
where
    W: AsyncWrite + Unpin,
{
    while let Some((response, framing)) = rx.recv().await {
        write_message(&mut writer, &response, framing)
            .await
            .map_err(ServeError::Write)?;
    }
    Ok(())
}
