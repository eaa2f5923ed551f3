//! LLM provider abstraction layer.
//!
//! Defines the [`LlmProvider`] trait and the shared request/response types
//! used by all provider implementations.
//!
//! Two providers are implemented:
//! - [`openai::OpenAiProvider`]: chat-completions API, bearer auth
//! - [`anthropic::AnthropicProvider`]: messages API with the top-level
//!   `system` field split out of the message list
//!
//! Adapters are stateless per call: [`factory::ProviderFactory`] builds a
//! fresh adapter for every request, injecting the per-provider timeout from
//! configuration. The API key travels with each [`CompletionRequest`].

use std::pin::Pin;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::Stream;

use crate::error::{Error, Result};

pub mod anthropic;
pub mod factory;
pub mod openai;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message.
    System,
    /// Human user message.
    User,
    /// Assistant (LLM) message.
    Assistant,
}

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// Plain text content.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message. A trailing assistant message acts as a
    /// prefill turn: the model continues from its content.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A request to an LLM provider for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages, system entries included.
    pub messages: Vec<ChatMessage>,
    /// API key for the vendor.
    pub api_key: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Whether system messages are hoisted into a top-level `system` field
    /// before sending. `None` selects the vendor default (on for Anthropic,
    /// off for OpenAI).
    pub normalize_system: Option<bool>,
}

impl CompletionRequest {
    /// Build a request with only the required fields set.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages,
            api_key: api_key.into(),
            temperature: None,
            max_tokens: None,
            top_p: None,
            normalize_system: None,
        }
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens used in the prompt/input.
    pub input_tokens: u64,
    /// Tokens generated in the response.
    pub output_tokens: u64,
    /// Input plus output.
    pub total_tokens: u64,
}

/// The response from an LLM provider.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Response text content.
    pub content: String,
    /// The model identifier that served this response.
    pub model: String,
    /// Token usage, when reported.
    pub usage: Option<TokenUsage>,
    /// The raw vendor response body.
    pub raw: Value,
}

/// Stream of text fragments from [`LlmProvider::stream_complete`].
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Core LLM provider interface.
///
/// All provider implementations must be `Send + Sync` to allow use across
/// async task boundaries.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Request a completion from the LLM.
    ///
    /// # Errors
    ///
    /// Returns a provider error variant of [`Error`] on API, network, or
    /// parse failure.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;

    /// Request a completion as a stream of text fragments.
    ///
    /// Providers without native streaming yield the full completion as a
    /// single fragment.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`LlmProvider::complete`].
    async fn stream_complete(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let completion = self.complete(request).await?;
        Ok(Box::pin(tokio_stream::once(Ok(completion.content))))
    }

    /// Provider name as used by the factory registry.
    fn name(&self) -> &'static str;

    /// Whether this provider streams incrementally.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Whether this provider supports native function calling.
    fn supports_function_calling(&self) -> bool;
}

// ---------------------------------------------------------------------------
// HTTP helpers shared by the adapters
// ---------------------------------------------------------------------------

/// Check a provider HTTP response and decode the JSON body.
///
/// # Errors
///
/// Maps 401 to an authentication error, 429 to a rate-limit error, 5xx to an
/// upstream error, and any other non-2xx status to a generic provider error
/// carrying the sanitized response body.
pub(crate) async fn check_response(provider: &'static str, response: reqwest::Response) -> Result<Value> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| Error::ProviderConnection {
        provider: provider.to_owned(),
        reason: e.to_string(),
    })?;

    match status {
        200..=299 => serde_json::from_str(&body).map_err(|e| Error::ProviderResponse {
            provider: provider.to_owned(),
            status,
            body: format!("invalid JSON body: {e}"),
        }),
        401 => Err(Error::ProviderAuthentication {
            provider: provider.to_owned(),
        }),
        429 => Err(Error::ProviderRateLimited {
            provider: provider.to_owned(),
        }),
        500..=599 => Err(Error::ProviderUpstream {
            provider: provider.to_owned(),
            status,
        }),
        _ => Err(Error::ProviderResponse {
            provider: provider.to_owned(),
            status,
            body: sanitize_error_body(&body),
        }),
    }
}

/// Map a transport-level `reqwest` failure to the provider error taxonomy.
pub(crate) fn transport_error(
    provider: &'static str,
    timeout_secs: u64,
    e: reqwest::Error,
) -> Error {
    if e.is_timeout() {
        Error::ProviderTimeout {
            provider: provider.to_owned(),
            timeout_secs,
        }
    } else {
        Error::ProviderConnection {
            provider: provider.to_owned(),
            reason: e.to_string(),
        }
    }
}

/// Collapse whitespace, redact credential-shaped substrings, and truncate an
/// error body before it reaches logs or error details.
pub(crate) fn sanitize_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"sk-ant-[A-Za-z0-9_\-]{10,}",
        r"sk-[A-Za-z0-9]{32,}",
        r"Bearer [A-Za-z0-9_\-\.]{16,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
