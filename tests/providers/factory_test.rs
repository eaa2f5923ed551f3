//! Provider factory registry tests.

use std::sync::Arc;
use std::time::Duration;

use straylight::error::Result;
use straylight::providers::factory::ProviderFactory;
use straylight::providers::{Completion, CompletionRequest, LlmProvider};

struct DummyProvider;

#[async_trait::async_trait]
impl LlmProvider for DummyProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        Ok(Completion {
            content: format!("echo:{}", request.model),
            model: request.model,
            usage: None,
            raw: serde_json::Value::Null,
        })
    }

    fn name(&self) -> &'static str {
        "dummy"
    }

    fn supports_function_calling(&self) -> bool {
        false
    }
}

#[test]
fn defaults_expose_both_vendors() {
    let factory = ProviderFactory::with_defaults();
    assert_eq!(factory.provider_names(), vec!["anthropic", "openai"]);
    assert!(factory.get("openai", Duration::from_secs(1)).is_ok());
    assert!(factory.get("anthropic", Duration::from_secs(1)).is_ok());
}

#[test]
fn unknown_provider_maps_to_bad_request() {
    let factory = ProviderFactory::with_defaults();
    let err = factory
        .get("mistral", Duration::from_secs(1))
        .err()
        .expect("unknown provider should fail");
    assert_eq!(err.status_code(), 400);
    assert!(err.to_string().contains("Invalid provider"));
}

#[tokio::test]
async fn third_party_adapters_can_be_registered() {
    let mut factory = ProviderFactory::with_defaults();
    factory.register("dummy", |_timeout| {
        Ok(Arc::new(DummyProvider) as Arc<dyn LlmProvider>)
    });

    let provider = factory
        .get("dummy", Duration::from_secs(1))
        .expect("registered provider should resolve");
    let completion = provider
        .complete(CompletionRequest::new("m1", vec![], "key"))
        .await
        .expect("dummy completes");
    assert_eq!(completion.content, "echo:m1");
}

#[tokio::test]
async fn default_stream_yields_single_fragment() {
    use tokio_stream::StreamExt;

    let mut factory = ProviderFactory::new();
    factory.register("dummy", |_timeout| {
        Ok(Arc::new(DummyProvider) as Arc<dyn LlmProvider>)
    });
    let provider = factory
        .get("dummy", Duration::from_secs(1))
        .expect("resolve");

    let mut stream = provider
        .stream_complete(CompletionRequest::new("m1", vec![], "key"))
        .await
        .expect("stream starts");

    let first = stream.next().await.expect("one fragment").expect("ok");
    assert_eq!(first, "echo:m1");
    assert!(stream.next().await.is_none());
}
