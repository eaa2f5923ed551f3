//! External MCP provider integration.
//!
//! An external provider is a child process hosting an MCP server reachable
//! over HTTP with SSE responses. [`client::ExternalMcpClient`] speaks the
//! protocol (handshake, `tools/list`, `tools/call`);
//! [`process::ExternalMcpProcess`] supervises the child process hosting the
//! server.

pub mod client;
pub mod process;

pub use client::{ExternalMcpClient, McpContent, McpToolDef, McpToolResponse};
pub use process::ExternalMcpProcess;
