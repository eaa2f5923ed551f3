//! MCP JSON-RPC 2.0 client over HTTP with SSE responses.
//!
//! Implements the MCP handshake (`initialize` + `notifications/initialized`),
//! tool discovery (`tools/list`) and tool invocation (`tools/call`) against
//! an external server in streamable-HTTP mode. Requests are issued serially;
//! each POST receives a single SSE frame parsed by [`crate::protocol::sse`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::sse;
use crate::protocol::{
    initialize_params, methods, JsonRpcNotification, JsonRpcRequest, ACCEPT_SSE,
    HEALTHY_STATUS_CODES, MCP_ENDPOINT, NOTIFICATION_SUCCESS_CODES, SESSION_ID_HEADER,
};

/// A tool discovered via MCP `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDef {
    /// Tool name as reported by the MCP server.
    pub name: String,
    /// Optional description of what the tool does.
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    #[serde(default = "default_empty_object", rename = "inputSchema")]
    pub input_schema: Value,
}

fn default_empty_object() -> Value {
    serde_json::json!({})
}

/// A single content part in an MCP tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpContent {
    /// Content type ("text", "image", "resource").
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content (for type="text").
    pub text: Option<String>,
}

impl McpContent {
    /// Build a text content part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_owned(),
            text: Some(text.into()),
        }
    }
}

/// Result of an MCP `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResponse {
    /// Content blocks returned by the tool.
    #[serde(default)]
    pub content: Vec<McpContent>,
    /// Whether the tool invocation was an error.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl McpToolResponse {
    /// Collect the text of all text-typed content parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|part| part.content_type == "text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// Session state mutated only by `initialize_session` and `close`.
#[derive(Debug, Default)]
struct SessionState {
    session_id: Option<String>,
    initialized: bool,
}

/// HTTP client for an external MCP server.
pub struct ExternalMcpClient {
    server_url: String,
    timeout: Duration,
    max_retries: u32,
    http: reqwest::Client,
    session: tokio::sync::Mutex<SessionState>,
}

impl std::fmt::Debug for ExternalMcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalMcpClient")
            .field("server_url", &self.server_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ExternalMcpClient {
    /// Create a client for the server at `server_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::McpConnection`] if the HTTP client cannot be built.
    pub fn new(server_url: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::McpConnection {
                server_url: server_url.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            server_url: server_url.trim_end_matches('/').to_owned(),
            timeout,
            max_retries,
            http,
            session: tokio::sync::Mutex::new(SessionState::default()),
        })
    }

    /// Base URL of the server this client talks to.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self) -> String {
        format!("{}{MCP_ENDPOINT}", self.server_url)
    }

    /// Perform the MCP session handshake. Idempotent.
    ///
    /// Sends `initialize`, captures the session-id response header when
    /// present, then sends the `notifications/initialized` notification.
    /// No `tools/*` call is issued before the notification completes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::McpConnection`] / [`Error::McpTimeout`] on transport
    /// failure and [`Error::McpProtocol`] when the server rejects the
    /// handshake.
    pub async fn initialize_session(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.initialized {
            return Ok(());
        }

        info!(server = %self.server_url, "starting MCP session initialization");

        let request = JsonRpcRequest::new(methods::INITIALIZE, Some(initialize_params()));
        // The initialize request carries no session id header.
        let response = self
            .http
            .post(self.endpoint())
            .header("Accept", ACCEPT_SSE)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(methods::INITIALIZE, e))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(Error::McpProtocol {
                method: methods::INITIALIZE.to_owned(),
                reason: format!("failed to initialize MCP session: HTTP {status}"),
            });
        }

        if let Some(session_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            debug!(session_id, "got session id from initialize response");
            session.session_id = Some(session_id.to_owned());
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(methods::INITIALIZE, e))?;
        let result = sse::extract_mcp_result(&text);
        if !result.success {
            return Err(Error::McpProtocol {
                method: methods::INITIALIZE.to_owned(),
                reason: format!(
                    "MCP initialization error: {}",
                    result.error_message.unwrap_or_else(|| "unknown".to_owned())
                ),
            });
        }

        self.send_initialized_notification(session.session_id.as_deref())
            .await?;

        session.initialized = true;
        info!(session_id = ?session.session_id, "MCP session initialized");
        Ok(())
    }

    async fn send_initialized_notification(&self, session_id: Option<&str>) -> Result<()> {
        let notification = JsonRpcNotification::new(methods::INITIALIZED, None);

        let mut builder = self
            .http
            .post(self.endpoint())
            .header("Accept", ACCEPT_SSE)
            .json(&notification);
        if let Some(id) = session_id {
            builder = builder.header(SESSION_ID_HEADER, id);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(methods::INITIALIZED, e))?;

        let status = response.status().as_u16();
        if !NOTIFICATION_SUCCESS_CODES.contains(&status) {
            return Err(Error::McpProtocol {
                method: methods::INITIALIZED.to_owned(),
                reason: format!("failed to send initialized notification: HTTP {status}"),
            });
        }
        Ok(())
    }

    /// Check whether the server is alive.
    ///
    /// GETs the MCP endpoint with the SSE accept header. Servers may refuse
    /// GET with 400/405/406 while being perfectly healthy, so those count as
    /// alive. All transport errors are swallowed and reported as `false`.
    pub async fn health_check(&self) -> bool {
        let result = self
            .http
            .get(self.endpoint())
            .header("Accept", "text/event-stream")
            .header("Content-Type", "application/json")
            .send()
            .await;

        match result {
            Ok(response) => HEALTHY_STATUS_CODES.contains(&response.status().as_u16()),
            Err(e) => {
                warn!(error = %e, "health check failed");
                false
            }
        }
    }

    /// Discover available tools via `tools/list`.
    ///
    /// Retries transient HTTP failures with capped exponential backoff and
    /// returns an empty list after exhausting the retry budget or on an MCP
    /// error response.
    ///
    /// # Errors
    ///
    /// Fails only when session initialization fails.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>> {
        self.initialize_session().await?;

        let request = JsonRpcRequest::new(methods::LIST_TOOLS, Some(serde_json::json!({})));

        for attempt in 1..=self.max_retries {
            match self.post_rpc(&request).await {
                Ok(text) => {
                    let result = sse::extract_mcp_result(&text);
                    if !result.success {
                        warn!(error = ?result.error_message, "MCP error listing tools");
                        return Ok(Vec::new());
                    }
                    let tools = result
                        .payload
                        .as_ref()
                        .and_then(|r| r.get("tools"))
                        .cloned();
                    let Some(tools) = tools else {
                        warn!("tools/list response missing 'tools' field");
                        return Ok(Vec::new());
                    };
                    match serde_json::from_value(tools) {
                        Ok(defs) => return Ok(defs),
                        Err(e) => {
                            warn!(error = %e, "failed to deserialize tool list");
                            return Ok(Vec::new());
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, "failed to list tools");
                }
            }

            if attempt < self.max_retries {
                self.backoff(attempt).await;
            }
        }

        Ok(Vec::new())
    }

    /// Invoke a tool via `tools/call`.
    ///
    /// HTTP and SSE parse failures are retried with capped exponential
    /// backoff; an MCP-level error response is returned immediately with the
    /// error flag set. After exhausting retries the response is error-flagged
    /// with a descriptive text part; this method never fails for transport
    /// reasons.
    ///
    /// # Errors
    ///
    /// Fails only when session initialization fails.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<McpToolResponse> {
        self.initialize_session().await?;

        let params = serde_json::json!({ "name": tool_name, "arguments": arguments });
        let request = JsonRpcRequest::new(methods::CALL_TOOL, Some(params));

        for attempt in 1..=self.max_retries {
            info!(
                tool = tool_name,
                attempt,
                max_attempts = self.max_retries,
                "calling external MCP tool"
            );

            match self.post_rpc(&request).await {
                Ok(text) => {
                    let result = sse::extract_mcp_result(&text);
                    if result.success {
                        let content = result
                            .payload
                            .as_ref()
                            .and_then(|r| r.get("content"))
                            .cloned()
                            .and_then(|c| serde_json::from_value(c).ok())
                            .unwrap_or_default();
                        return Ok(McpToolResponse {
                            content,
                            is_error: false,
                        });
                    }

                    // An error frame is a definitive answer from the server;
                    // a frame that failed to parse warrants a retry.
                    if let Some(message) = result.error_message {
                        if result.payload.is_some() {
                            warn!(tool = tool_name, error = %message, "MCP tool call error");
                            return Ok(McpToolResponse {
                                content: vec![McpContent::text(format!("Error: {message}"))],
                                is_error: true,
                            });
                        }
                        warn!(tool = tool_name, error = %message, "failed to parse tool response");
                    }
                }
                Err(e) => {
                    warn!(tool = tool_name, error = %e, attempt, "HTTP error calling tool");
                }
            }

            if attempt < self.max_retries {
                self.backoff(attempt).await;
            }
        }

        Ok(McpToolResponse {
            content: vec![McpContent::text(format!(
                "Failed to call tool '{tool_name}' after {} attempts",
                self.max_retries
            ))],
            is_error: true,
        })
    }

    /// Drop the session state. Safe to call multiple times.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        session.initialized = false;
        session.session_id = None;
        info!("MCP client closed");
    }

    async fn post_rpc(&self, request: &JsonRpcRequest<'_>) -> Result<String> {
        let session_id = {
            let session = self.session.lock().await;
            session.session_id.clone()
        };

        let mut builder = self
            .http
            .post(self.endpoint())
            .header("Accept", ACCEPT_SSE)
            .json(request);
        if let Some(id) = &session_id {
            builder = builder.header(SESSION_ID_HEADER, id);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(request.method, e))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(Error::McpProtocol {
                method: request.method.to_owned(),
                reason: format!("HTTP {status}"),
            });
        }

        response
            .text()
            .await
            .map_err(|e| self.transport_error(request.method, e))
    }

    fn transport_error(&self, method: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::McpTimeout {
                operation: method.to_owned(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::McpConnection {
                server_url: self.server_url.clone(),
                reason: e.to_string(),
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let exponent = attempt.saturating_sub(1).min(6);
        let delay = 2u64.saturating_pow(exponent).min(60);
        info!(delay_seconds = delay, "retrying after delay");
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }
}
