//! MCP Tool Discovery
//!
//! Client side of the Model Context Protocol over stdio. The server runs
//! as a child process; requests are newline-delimited JSON-RPC 2.0.
//! Every tool the server advertises becomes a `RemoteTool` that shares the
//! one connection.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use agent_core::{
    error::{AgentError, Result},
    tool::{ParamType, ParameterSchema, Tool, ToolArguments, ToolSchema},
};

const PROTOCOL_VERSION: &str = "2024-11-05";
const DISCONNECTED: &str = "remote tool provider disconnected";

/// How to launch one MCP server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct McpServerConfig {
    /// Prefix for the exposed tool names
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
}

impl McpServerConfig {
    /// The reference filesystem server, confined to `root`
    pub fn filesystem(command: impl Into<String>, root: &Path) -> Self {
        Self {
            name: "filesystem".into(),
            command: command.into(),
            args: vec![
                "-y".into(),
                "@modelcontextprotocol/server-filesystem".into(),
                root.display().to_string(),
            ],
        }
    }
}

/// A running server process and its pipes
struct McpConnection {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl McpConnection {
    fn spawn(config: &McpServerConfig) -> std::io::Result<Self> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(std::io::Error::other("server pipes unavailable"));
        };

        // Server diagnostics go to the log, never to the conversation.
        if let Some(stderr) = child.stderr.take() {
            let server = config.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server = %server, "{line}");
                }
            });
        }

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
        })
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn send(&mut self, message: &Value) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn notify(&mut self, method: &str) -> Result<()> {
        self.send(&json!({ "jsonrpc": "2.0", "method": method, "params": {} }))
            .await
    }

    /// Send a request and return its `result`
    async fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await?;

        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line).await? == 0 {
                return Err(AgentError::ToolExecution(DISCONNECTED.into()));
            }
            let Ok(message) = serde_json::from_str::<Value>(line.trim()) else {
                tracing::debug!(line = %line.trim(), "skipping non-JSON server output");
                continue;
            };
            if message.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }
            if let Some(err) = message.get("error") {
                return Err(AgentError::ToolExecution(format!("MCP server error: {err}")));
            }
            return Ok(message.get("result").cloned().unwrap_or(Value::Null));
        }
    }
}

type SharedConnection = Arc<Mutex<Option<McpConnection>>>;

/// Connection to one MCP server
pub struct McpClient {
    name: String,
    connection: SharedConnection,
}

impl McpClient {
    /// Spawn the server and perform the initialize handshake
    pub async fn connect(config: &McpServerConfig) -> Result<Self> {
        tracing::info!(server = %config.name, command = %config.command, "starting MCP server");

        let unavailable = |err: AgentError| {
            AgentError::ToolDiscoveryUnavailable(format!("{} ({}): {err}", config.name, config.command))
        };

        let mut conn = McpConnection::spawn(config).map_err(|e| unavailable(e.into()))?;
        let init = conn
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await
            .map_err(unavailable)?;
        tracing::debug!(server = %config.name, server_info = %init["serverInfo"], "MCP initialized");
        conn.notify("notifications/initialized").await.map_err(unavailable)?;

        Ok(Self {
            name: config.name.clone(),
            connection: Arc::new(Mutex::new(Some(conn))),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discover the server's tools
    pub async fn list(&self) -> Result<Vec<RemoteTool>> {
        let result = {
            let mut guard = self.connection.lock().await;
            let conn = guard
                .as_mut()
                .ok_or_else(|| AgentError::ToolDiscoveryUnavailable(DISCONNECTED.into()))?;
            conn.request("tools/list", json!({}))
                .await
                .map_err(|e| AgentError::ToolDiscoveryUnavailable(e.to_string()))?
        };

        let tools: Vec<RemoteTool> = result
            .get("tools")
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(|tool| RemoteTool::from_listing(&self.name, tool, self.connection.clone()))
                    .collect()
            })
            .unwrap_or_default();

        tracing::info!(server = %self.name, tools = tools.len(), "discovered remote tools");
        Ok(tools)
    }

    /// Kill and reap the server. Safe to call more than once.
    pub async fn close(&self) {
        let Some(mut conn) = self.connection.lock().await.take() else {
            return;
        };
        if let Err(e) = conn.child.kill().await {
            tracing::warn!(server = %self.name, error = %e, "failed to stop MCP server");
        } else {
            tracing::info!(server = %self.name, "MCP server stopped");
        }
    }
}

/// A tool advertised by an MCP server
pub struct RemoteTool {
    remote_name: String,
    schema: ToolSchema,
    connection: SharedConnection,
}

impl RemoteTool {
    fn from_listing(server: &str, listing: &Value, connection: SharedConnection) -> Option<Self> {
        let remote_name = listing.get("name")?.as_str()?.to_string();
        let description = listing
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let parameters = listing
            .get("inputSchema")
            .map(parameters_from_input_schema)
            .unwrap_or_default();

        Some(Self {
            schema: ToolSchema {
                name: exposed_name(server, &remote_name),
                description,
                parameters,
            },
            remote_name,
            connection,
        })
    }

    /// Name on the server, without the prefix
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, args: &ToolArguments) -> Result<String> {
        let mut guard = self.connection.lock().await;
        let alive = guard.as_mut().is_some_and(McpConnection::is_alive);
        let conn = match guard.as_mut() {
            Some(conn) if alive => conn,
            _ => {
                tracing::warn!(tool = %self.schema.name, "remote tool called after disconnect");
                return Err(AgentError::ToolExecution(DISCONNECTED.into()));
            }
        };

        let result = conn
            .request(
                "tools/call",
                json!({ "name": self.remote_name, "arguments": args.to_value() }),
            )
            .await?;

        let text = result
            .get("content")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_else(|| result.to_string());

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(AgentError::ToolExecution(text));
        }
        Ok(text)
    }
}

/// Registry name for a remote tool
pub fn exposed_name(server: &str, tool: &str) -> String {
    format!("{server}__{tool}")
}

/// Map an MCP `inputSchema` onto parameter definitions
fn parameters_from_input_schema(schema: &Value) -> Vec<ParameterSchema> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| {
            let description = prop
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let param_type = param_type_of(prop);
            if required.contains(&name.as_str()) {
                ParameterSchema::required(name.clone(), param_type, description)
            } else {
                ParameterSchema::optional(name.clone(), param_type, description)
            }
        })
        .collect()
}

fn param_type_of(prop: &Value) -> ParamType {
    match prop.get("type").and_then(Value::as_str) {
        Some("string") => ParamType::String,
        Some("number" | "integer") => ParamType::Number,
        Some("boolean") => ParamType::Boolean,
        Some("array") if prop["items"]["type"] == "string" => ParamType::StringArray,
        _ => {
            let mut raw = prop.clone();
            if let Some(map) = raw.as_object_mut() {
                map.remove("description");
            }
            ParamType::Json(raw)
        }
    }
}
