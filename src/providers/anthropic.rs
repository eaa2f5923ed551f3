//! Anthropic provider implementation using the `/v1/messages` API.
//!
//! The messages endpoint rejects `system`-role entries in the message list:
//! it expects a top-level `system` string instead. [`build_request`] performs
//! that split: all system messages are concatenated with newlines into the
//! `system` field and removed from the list, unless the caller disables
//! normalization, in which case system entries are downgraded to user turns.
//! A trailing assistant message passes through untouched, which is how
//! callers prefill the reply (e.g. with `{` to force JSON output).

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

use super::{
    check_response, transport_error, Completion, CompletionRequest, LlmProvider, Role, TokenUsage,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER_NAME: &str = "anthropic";
const DEFAULT_MAX_TOKENS: u32 = 1024;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Anthropic messages API request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// Model identifier.
    pub model: String,
    /// Non-system conversation messages.
    pub messages: Vec<AnthropicMessage>,
    /// Top-level system prompt, omitted when no system message was present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Maximum completion tokens (required by the API).
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// A message in Anthropic format (`user` or `assistant` only).
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AnthropicMessage {
    /// Role.
    pub role: &'static str,
    /// Plain text content.
    pub content: String,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Anthropic messages API provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a provider with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(ANTHROPIC_API_BASE, timeout)
    }

    /// Create a provider against a non-default endpoint (self-hosted
    /// gateways, tests).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration {
                key: "anthropic".to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.to_owned(),
            timeout,
            client,
        })
    }
}

/// Build an Anthropic API request body from a completion request.
///
/// With normalization on (the default), system messages are concatenated
/// with newlines into the top-level `system` field (omitted entirely when
/// there are none) and the remaining messages keep their original order.
#[doc(hidden)]
pub fn build_request(request: &CompletionRequest) -> AnthropicRequest {
    let normalize = request.normalize_system.unwrap_or(true);

    let mut system_parts: Vec<&str> = Vec::new();
    let mut messages: Vec<AnthropicMessage> = Vec::new();

    for msg in &request.messages {
        match msg.role {
            Role::System if normalize => system_parts.push(&msg.content),
            Role::System => messages.push(AnthropicMessage {
                role: "user",
                content: msg.content.clone(),
            }),
            Role::User => messages.push(AnthropicMessage {
                role: "user",
                content: msg.content.clone(),
            }),
            Role::Assistant => messages.push(AnthropicMessage {
                role: "assistant",
                content: msg.content.clone(),
            }),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n"))
    };

    AnthropicRequest {
        model: request.model.clone(),
        messages,
        system,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: request.temperature,
        top_p: request.top_p,
    }
}

/// Extract the completion from an Anthropic response body.
///
/// # Errors
///
/// Returns a provider error when `content[0].text` is missing.
#[doc(hidden)]
pub fn parse_response(raw: Value) -> Result<Completion> {
    let content = raw
        .pointer("/content/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ProviderResponse {
            provider: PROVIDER_NAME.to_owned(),
            status: 200,
            body: "missing content[0].text".to_owned(),
        })?
        .to_owned();

    let model = raw
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let usage = raw.get("usage").map(|usage| {
        let input = usage
            .get("input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let output = usage
            .get("output_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input.saturating_add(output),
        }
    });

    Ok(Completion {
        content,
        model,
        usage,
        raw,
    })
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = build_request(&request);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &request.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER_NAME, self.timeout.as_secs(), e))?;

        let raw = check_response(PROVIDER_NAME, response).await?;
        let mut completion = parse_response(raw)?;
        if completion.model.is_empty() {
            completion.model = request.model;
        }
        Ok(completion)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn supports_function_calling(&self) -> bool {
        true
    }
}
