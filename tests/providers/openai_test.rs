//! OpenAI adapter wire-format and error-mapping tests.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use straylight::error::Error;
use straylight::providers::openai::{build_request, OpenAiProvider};
use straylight::providers::{ChatMessage, CompletionRequest, LlmProvider};

fn request_with(messages: Vec<ChatMessage>) -> CompletionRequest {
    let mut request = CompletionRequest::new("gpt-test", messages, "sk-test-key");
    request.temperature = Some(0.2);
    request.max_tokens = Some(100);
    request
}

#[test]
fn build_request_passes_messages_verbatim() {
    let request = request_with(vec![
        ChatMessage::system("S"),
        ChatMessage::user("U"),
        ChatMessage::assistant("A"),
    ]);
    let body = build_request(&request);

    assert_eq!(body.model, "gpt-test");
    assert_eq!(body.messages.len(), 3);
    assert_eq!(body.messages[0].role, "system");
    assert_eq!(body.messages[0].content, "S");
    assert_eq!(body.messages[1].role, "user");
    assert_eq!(body.messages[2].role, "assistant");
    assert_eq!(body.temperature, Some(0.2));
    assert_eq!(body.max_tokens, Some(100));
}

#[tokio::test]
async fn complete_sends_bearer_auth_and_parses_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("authorization", "Bearer sk-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello there"}}],
            "model": "gpt-test-0001",
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url(&server.uri(), Duration::from_secs(5))
        .expect("provider should build");
    let completion = provider
        .complete(request_with(vec![ChatMessage::user("hi")]))
        .await
        .expect("call should succeed");

    assert_eq!(completion.content, "Hello there");
    assert_eq!(completion.model, "gpt-test-0001");
    let usage = completion.usage.expect("usage");
    assert_eq!(usage.input_tokens, 12);
    assert_eq!(usage.output_tokens, 4);
    assert_eq!(usage.total_tokens, 16);
}

#[tokio::test]
async fn complete_maps_status_codes_to_typed_errors() {
    for (status, expected) in [(401u16, 401u16), (429, 429), (503, 502), (418, 500)] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("{\"error\":\"x\"}"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url(&server.uri(), Duration::from_secs(5))
            .expect("provider should build");
        let err = provider
            .complete(request_with(vec![ChatMessage::user("hi")]))
            .await
            .expect_err("call should fail");

        assert_eq!(err.status_code(), expected, "HTTP {status}");
    }
}

#[tokio::test]
async fn complete_times_out_as_provider_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({"choices": []})),
        )
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url(&server.uri(), Duration::from_millis(200))
        .expect("provider should build");
    let err = provider
        .complete(request_with(vec![ChatMessage::user("hi")]))
        .await
        .expect_err("call should time out");

    assert!(matches!(err, Error::ProviderTimeout { .. }), "{err}");
    assert_eq!(err.status_code(), 504);
}

#[tokio::test]
async fn complete_rejects_missing_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url(&server.uri(), Duration::from_secs(5))
        .expect("provider should build");
    let err = provider
        .complete(request_with(vec![ChatMessage::user("hi")]))
        .await
        .expect_err("missing content should fail");
    assert!(err.to_string().contains("choices[0]"), "{err}");
}
