//! OpenAI provider implementation using the `/v1/chat/completions` API.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

use super::{
    check_response, transport_error, Completion, CompletionRequest, LlmProvider, Role, TokenUsage,
};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/chat/completions";
const PROVIDER_NAME: &str = "openai";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// OpenAI chat completions API request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages, roles passed through verbatim.
    pub messages: Vec<OpenAiMessage>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum completion tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// A message in OpenAI chat format.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct OpenAiMessage {
    /// Role (`system`, `user`, `assistant`).
    pub role: &'static str,
    /// Plain text content.
    pub content: String,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// OpenAI chat completions API provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a provider with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(OPENAI_API_BASE, timeout)
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
                key: "openai".to_owned(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: base_url.to_owned(),
            timeout,
            client,
        })
    }
}

/// Build an OpenAI API request body from a completion request.
///
/// Messages pass through verbatim: OpenAI accepts system entries in the
/// message list, so no normalization is applied.
#[doc(hidden)]
pub fn build_request(request: &CompletionRequest) -> OpenAiRequest {
    let messages = request
        .messages
        .iter()
        .map(|msg| OpenAiMessage {
            role: role_str(msg.role),
            content: msg.content.clone(),
        })
        .collect();

    OpenAiRequest {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        top_p: request.top_p,
    }
}

/// Extract the completion from an OpenAI response body.
///
/// # Errors
///
/// Returns a provider error when `choices[0].message.content` is missing.
#[doc(hidden)]
pub fn parse_response(raw: Value) -> Result<Completion> {
    let content = raw
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ProviderResponse {
            provider: PROVIDER_NAME.to_owned(),
            status: 200,
            body: "missing choices[0].message.content".to_owned(),
        })?
        .to_owned();

    let model = raw
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let usage = raw.get("usage").map(|usage| {
        let input = usage
            .get("prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let output = usage
            .get("completion_tokens")
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

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let body = build_request(&request);

        let response = self
            .client
            .post(&self.base_url)
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", request.api_key))
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
