//! Straylight: LLM-backed applicant evaluation and routing service.
//!
//! The crate is organised around four subsystems:
//!
//! - **External provider integration** ([`protocol`], [`mcp`]): JSON-RPC 2.0
//!   over HTTP with Server-Sent-Events responses, plus supervision of the
//!   child processes that host external MCP servers.
//! - **Plugin system** ([`plugins`]): a uniform plugin contract (initialize /
//!   execute / shutdown / metadata / validation) with a build-time registry,
//!   lazy instantiation and an optional hot-reload watcher.
//! - **Evaluation pipeline** ([`prompts`], [`scoring`], [`evaluation`]):
//!   versioned single- and multi-axis prompt templates, lenient per-axis
//!   score extraction, and the orchestrator that ties enrichment, prompt
//!   assembly, the provider call and score extraction into one response.
//! - **LLM provider abstraction** ([`providers`], [`routing`]): a single
//!   provider trait with per-vendor payload shaping, used by both the
//!   evaluation pipeline and the semantic router / reflection loop.
//!
//! HTTP framing, auth and CORS are handled by an outer web layer; this crate
//! exposes the services that layer consumes plus the error-to-status mapping
//! in [`error`].

pub mod config;
pub mod error;
pub mod evaluation;
pub mod logging;
pub mod mcp;
pub mod plugins;
pub mod prompts;
pub mod protocol;
pub mod providers;
pub mod routing;
pub mod scoring;
