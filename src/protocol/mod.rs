//! MCP wire protocol: JSON-RPC 2.0 framing and protocol constants.
//!
//! External providers speak JSON-RPC 2.0 over HTTP, replying with a single
//! Server-Sent-Events frame per request (see [`sse`]). This module holds the
//! request/notification wire structs and the constants shared by the client
//! and the process supervisor.

use serde::{Deserialize, Serialize};

pub mod sse;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";
/// MCP protocol revision negotiated during `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
/// Client name reported in the `initialize` handshake.
pub const MCP_CLIENT_NAME: &str = "straylight";
/// Client version reported in the `initialize` handshake.
pub const MCP_CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request id used for all client requests; calls are issued serially within
/// a session, so ids never need to disambiguate in-flight requests.
pub const DEFAULT_REQUEST_ID: u64 = 1;

/// MCP endpoint path. The trailing slash is load-bearing: streamable-HTTP
/// servers 307-redirect `/mcp` to `/mcp/`.
pub const MCP_ENDPOINT: &str = "/mcp/";

/// `Accept` value sent with every MCP request.
pub const ACCEPT_SSE: &str = "application/json, text/event-stream";
/// Header carrying the server-assigned session id.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Status codes treated as "server is alive" by the health check. Servers may
/// legitimately refuse GET (400/405/406) while being healthy.
pub const HEALTHY_STATUS_CODES: [u16; 4] = [200, 400, 405, 406];
/// Status codes accepted for notifications (202 = async processing).
pub const NOTIFICATION_SUCCESS_CODES: [u16; 2] = [200, 202];

/// JSON-RPC method names used by the client.
pub mod methods {
    /// Session handshake.
    pub const INITIALIZE: &str = "initialize";
    /// Handshake completion notification.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Tool discovery.
    pub const LIST_TOOLS: &str = "tools/list";
    /// Tool invocation.
    pub const CALL_TOOL: &str = "tools/call";
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request id.
    pub id: u64,
    /// Method name.
    pub method: &'a str,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl<'a> JsonRpcRequest<'a> {
    /// Build a request with the default id.
    pub fn new(method: &'a str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: DEFAULT_REQUEST_ID,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (a request without an id).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: &'a str,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl<'a> JsonRpcNotification<'a> {
    /// Build a notification.
    pub fn new(method: &'a str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Error message from the server.
    pub message: String,
}

/// Parameters for the `initialize` handshake.
pub fn initialize_params() -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": MCP_CLIENT_NAME,
            "version": MCP_CLIENT_VERSION,
        }
    })
}
