//! End-to-end evaluation pipeline tests with a stub provider.

use std::sync::Arc;

use straylight::config::Settings;
use straylight::error::Result;
use straylight::evaluation::{EvaluationRequest, EvaluationService};
use straylight::plugins::PluginManager;
use straylight::providers::factory::ProviderFactory;
use straylight::providers::{Completion, CompletionRequest, LlmProvider, Role};

/// Stub provider returning a fixed reply and recording the last request.
struct StubProvider {
    reply: String,
    seen: Arc<std::sync::Mutex<Option<CompletionRequest>>>,
}

#[async_trait::async_trait]
impl LlmProvider for StubProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        *self.seen.lock().expect("lock") = Some(request.clone());
        Ok(Completion {
            content: self.reply.clone(),
            model: request.model,
            usage: None,
            raw: serde_json::Value::Null,
        })
    }

    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports_function_calling(&self) -> bool {
        false
    }
}

async fn service_with_reply(
    reply: &str,
) -> (
    EvaluationService,
    Arc<std::sync::Mutex<Option<CompletionRequest>>>,
) {
    let settings = Settings::default();
    let seen = Arc::new(std::sync::Mutex::new(None));

    let mut factory = ProviderFactory::with_defaults();
    let reply = reply.to_owned();
    let seen_handle = Arc::clone(&seen);
    factory.register("stub", move |_timeout| {
        Ok(Arc::new(StubProvider {
            reply: reply.clone(),
            seen: Arc::clone(&seen_handle),
        }) as Arc<dyn LlmProvider>)
    });

    let factory = Arc::new(factory);
    let plugin_manager = Arc::new(PluginManager::new(&settings, &factory));
    plugin_manager.initialize().await.expect("plugin manager");
    (
        EvaluationService::new(settings, Arc::clone(&factory), plugin_manager),
        seen,
    )
}

fn multi_axis_request() -> EvaluationRequest {
    EvaluationRequest {
        api_key: "key".to_owned(),
        provider: "stub".to_owned(),
        model: "stub-model".to_owned(),
        applicant_data: "An applicant with ML background.".to_owned(),
        criteria_string: String::new(),
        template_id: None,
        custom_template: None,
        ranking_keyword: None,
        additional_instructions: None,
        use_multi_axis: true,
        use_plugin: false,
        source_url: None,
        pdf_url: None,
        normalize_system: None,
    }
}

#[tokio::test]
async fn multi_axis_evaluation_end_to_end() {
    let (service, seen) = service_with_reply(
        "Analysis...\nGENERAL_PROMISE_RATING = 5\nML_SKILLS_RATING = 3",
    )
    .await;

    let response = service
        .evaluate(multi_axis_request())
        .await
        .expect("evaluation should succeed");

    assert_eq!(response.provider, "stub");
    assert_eq!(response.model, "stub-model");
    assert_eq!(response.score, Some(5));

    let scores = response.scores.expect("scores");
    assert_eq!(scores.len(), 7);
    assert_eq!(scores[0].name, "General Promise");
    assert_eq!(scores[0].score, Some(5));
    assert_eq!(scores[1].name, "ML Skills");
    assert_eq!(scores[1].score, Some(3));
    assert_eq!(scores[2].score, None);

    assert!(response.result.contains("[MULTI_AXIS_SCORES]"));
    assert!(response.result.contains("General Promise: 5"));
    assert!(response.result.contains("ML Skills: 3"));
    assert!(response.result.contains("Policy Experience: Not found"));
    assert!(response.result.contains("[END_MULTI_AXIS_SCORES]"));

    // The prompt the provider saw: system first, then the applicant text,
    // evaluation temperature, provider max-tokens ceiling.
    let request = seen.lock().expect("lock").clone().expect("captured");
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages[0]
        .content
        .contains("GENERAL_PROMISE_RATING"));
    assert!(request.messages[0]
        .content
        .contains("Evaluate the candidate for the SPAR research program."));
    assert_eq!(request.messages[1].role, Role::User);
    assert_eq!(request.messages[1].content, "An applicant with ML background.");
    assert_eq!(request.temperature, Some(0.2));
    assert_eq!(request.max_tokens, Some(4096));
}

#[tokio::test]
async fn no_extractable_scores_appends_warning() {
    let (service, _) = service_with_reply("I decline to produce ratings.").await;

    let response = service
        .evaluate(multi_axis_request())
        .await
        .expect("evaluation should succeed");

    assert_eq!(response.score, None);
    assert!(response
        .result
        .contains("[WARNING] No multi-axis scores could be extracted"));
}

#[tokio::test]
async fn single_axis_mode_uses_first_spar_axis() {
    let (service, seen) =
        service_with_reply("Reasoning first.\nGENERAL_PROMISE_RATING = 4").await;

    let mut request = multi_axis_request();
    request.use_multi_axis = false;
    request.criteria_string = "Look for research experience.".to_owned();

    let response = service.evaluate(request).await.expect("evaluation");
    assert_eq!(response.score, Some(4));
    assert!(response.scores.is_none());

    // Single-axis prompts put the applicant text first, system second.
    let request = seen.lock().expect("lock").clone().expect("captured");
    assert_eq!(request.messages[0].role, Role::User);
    assert_eq!(request.messages[1].role, Role::System);
    assert!(request.messages[1]
        .content
        .contains("Look for research experience."));
    assert!(request.messages[1].content.contains("## General Promise"));
    assert!(!request.messages[1].content.contains("## ML Skills"));
}

#[tokio::test]
async fn unknown_provider_is_bad_request() {
    let (service, _) = service_with_reply("irrelevant").await;
    let mut request = multi_axis_request();
    request.provider = "nonexistent".to_owned();

    let err = service
        .evaluate(request)
        .await
        .expect_err("unknown provider should fail");
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn failing_enrichment_does_not_fail_evaluation() {
    let (service, _) = service_with_reply("GENERAL_PROMISE_RATING = 2").await;

    // The LinkedIn plugin cannot initialize without a cookie; enrichment
    // must log the failure and the evaluation must still complete.
    let mut request = multi_axis_request();
    request.use_plugin = true;
    request.source_url = Some("https://www.linkedin.com/in/jane-doe/".to_owned());

    let response = service
        .evaluate(request)
        .await
        .expect("evaluation should still succeed");

    assert_eq!(response.score, Some(2));
    assert!(response.result.contains("[ENRICHMENT LOG]"));
    assert!(response.result.contains("Detected LinkedIn profile URL"));
    assert!(response.result.contains("[END ENRICHMENT LOG]"));
    assert!(!response.result.contains("[LINKEDIN_DATA]"));
}
