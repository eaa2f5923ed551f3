//! Anthropic adapter tests: the system-split, prefill pass-through, headers.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use straylight::providers::anthropic::{build_request, AnthropicProvider};
use straylight::providers::{ChatMessage, CompletionRequest, LlmProvider};

fn request_with(messages: Vec<ChatMessage>) -> CompletionRequest {
    let mut request = CompletionRequest::new("claude-test", messages, "sk-ant-test");
    request.max_tokens = Some(100);
    request
}

#[test]
fn build_request_splits_system_out_of_messages() {
    let request = request_with(vec![ChatMessage::system("S"), ChatMessage::user("U")]);
    let body = build_request(&request);

    assert_eq!(body.system.as_deref(), Some("S"));
    assert_eq!(body.max_tokens, 100);
    assert_eq!(body.messages.len(), 1);
    assert_eq!(body.messages[0].role, "user");
    assert_eq!(body.messages[0].content, "U");
}

#[test]
fn build_request_concatenates_multiple_system_messages() {
    let request = request_with(vec![
        ChatMessage::system("first"),
        ChatMessage::system("second"),
        ChatMessage::user("U"),
    ]);
    let body = build_request(&request);

    assert_eq!(body.system.as_deref(), Some("first\nsecond"));
    assert_eq!(body.messages.len(), 1);
}

#[test]
fn build_request_omits_system_when_absent() {
    let request = request_with(vec![ChatMessage::user("U")]);
    let body = build_request(&request);

    assert!(body.system.is_none());
    let wire = serde_json::to_value(&body).expect("serialize");
    assert!(wire.get("system").is_none());
}

#[test]
fn build_request_preserves_non_system_order() {
    let request = request_with(vec![
        ChatMessage::user("u1"),
        ChatMessage::system("S"),
        ChatMessage::assistant("a1"),
        ChatMessage::user("u2"),
    ]);
    let body = build_request(&request);

    let roles: Vec<&str> = body.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec!["user", "assistant", "user"]);
    assert_eq!(body.messages[0].content, "u1");
    assert_eq!(body.messages[2].content, "u2");
}

#[test]
fn build_request_passes_prefill_assistant_turn_through() {
    // The resume parser prefills "{" to force JSON output; the trailing
    // assistant message must survive the split untouched.
    let request = request_with(vec![
        ChatMessage::system("parse strictly"),
        ChatMessage::user("resume text"),
        ChatMessage::assistant("{"),
    ]);
    let body = build_request(&request);

    assert_eq!(body.messages.len(), 2);
    assert_eq!(body.messages[1].role, "assistant");
    assert_eq!(body.messages[1].content, "{");
}

#[test]
fn build_request_normalization_disabled_downgrades_system() {
    let mut request = request_with(vec![ChatMessage::system("S"), ChatMessage::user("U")]);
    request.normalize_system = Some(false);
    let body = build_request(&request);

    assert!(body.system.is_none());
    assert_eq!(body.messages.len(), 2);
    assert_eq!(body.messages[0].role, "user");
}

#[tokio::test]
async fn complete_sends_api_key_and_version_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "All good"}],
            "model": "claude-test-0001",
            "usage": {"input_tokens": 7, "output_tokens": 3}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url(&server.uri(), Duration::from_secs(5))
        .expect("provider should build");
    let completion = provider
        .complete(request_with(vec![
            ChatMessage::system("S"),
            ChatMessage::user("U"),
        ]))
        .await
        .expect("call should succeed");

    assert_eq!(completion.content, "All good");
    assert_eq!(completion.model, "claude-test-0001");

    // Inspect the body the adapter actually sent: top-level system, no
    // system entries in the message list.
    let requests = server.received_requests().await.expect("recorded requests");
    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("request body should be JSON");
    assert_eq!(body["system"], "S");
    assert_eq!(body["max_tokens"], 100);
    assert_eq!(body["messages"], json!([{"role": "user", "content": "U"}]));
}

#[tokio::test]
async fn complete_maps_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{}"))
        .mount(&server)
        .await;

    let provider = AnthropicProvider::with_base_url(&server.uri(), Duration::from_secs(5))
        .expect("provider should build");
    let err = provider
        .complete(request_with(vec![ChatMessage::user("U")]))
        .await
        .expect_err("call should fail");
    assert_eq!(err.status_code(), 401);
}
