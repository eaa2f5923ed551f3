//! Semantic router tests with a scripted LLM provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::json;

use straylight::config::Settings;
use straylight::error::{Error, Result};
use straylight::plugins::manager::{PluginConstructor, PluginManager};
use straylight::plugins::echo::EchoPlugin;
use straylight::providers::{Completion, CompletionRequest, LlmProvider};
use straylight::routing::{MultiStepPlan, PlanStep, SemanticRouter};

/// Provider that replays a fixed sequence of replies.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(ToOwned::to_owned).collect()),
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
        let content = self
            .replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_default();
        Ok(Completion {
            content,
            model: "scripted".to_owned(),
            usage: None,
            raw: serde_json::Value::Null,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports_function_calling(&self) -> bool {
        false
    }
}

async fn echo_manager() -> Arc<PluginManager> {
    let ctor: PluginConstructor = Arc::new(|| Box::new(EchoPlugin::new()));
    let manager = Arc::new(PluginManager::with_sources(&Settings::default(), vec![ctor]));
    manager.initialize().await.expect("manager");
    manager
}

fn router_with(manager: Arc<PluginManager>, replies: Vec<&str>) -> SemanticRouter {
    SemanticRouter::new(manager, ScriptedProvider::new(replies), "key", "model")
}

#[tokio::test]
async fn route_parses_decision_json() {
    let manager = echo_manager().await;
    let router = router_with(
        manager,
        vec![r#"{"plugin": "echo", "confidence": 0.92, "reasoning": "echo fits", "parameters": {"message": "hello"}}"#],
    );

    let decision = router.route("say hello back").await.expect("route");
    assert_eq!(decision.plugin_name, "echo");
    assert!((decision.confidence - 0.92).abs() < 1e-9);
    assert_eq!(decision.parameters["message"], "hello");
}

#[tokio::test]
async fn route_strips_code_fences() {
    let manager = echo_manager().await;
    let router = router_with(
        manager,
        vec!["```json\n{\"plugin\": \"echo\", \"confidence\": 1.0, \"reasoning\": \"r\", \"parameters\": {}}\n```"],
    );

    let decision = router.route("echo something").await.expect("route");
    assert_eq!(decision.plugin_name, "echo");
}

#[tokio::test]
async fn route_rejects_unknown_plugin() {
    let manager = echo_manager().await;
    let router = router_with(
        manager,
        vec![r#"{"plugin": "teleporter", "confidence": 1.0, "reasoning": "r", "parameters": {}}"#],
    );

    let err = router
        .route("teleport me")
        .await
        .expect_err("unknown plugin should fail");
    assert!(matches!(err, Error::RoutingDecision { .. }));
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn route_with_no_plugins_is_service_unavailable() {
    let manager = Arc::new(PluginManager::with_sources(&Settings::default(), vec![]));
    manager.initialize().await.expect("manager");
    let router = router_with(manager, vec![]);

    let err = router.route("anything").await.expect_err("no plugins");
    assert!(matches!(err, Error::NoPluginsAvailable));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn execute_single_runs_the_selected_plugin() {
    let manager = echo_manager().await;
    let router = router_with(
        manager,
        vec![r#"{"plugin": "echo", "confidence": 0.9, "reasoning": "r", "parameters": {"message": "hi", "action": "echo"}}"#],
    );

    let response = router
        .execute_single("echo hi", None)
        .await
        .expect("execution");
    assert!(response.is_success());
    assert_eq!(response.data.expect("data")["echoed"], "hi");
}

#[tokio::test]
async fn multi_step_plan_with_forward_dependency_is_rejected_before_execution() {
    let manager = echo_manager().await;
    let router = router_with(Arc::clone(&manager), vec![]);

    let plan = MultiStepPlan {
        steps: vec![
            PlanStep {
                plugin_name: "echo".to_owned(),
                parameters: serde_json::Map::from_iter([(
                    "message".to_owned(),
                    json!("first"),
                )]),
                depends_on: vec![1],
            },
            PlanStep {
                plugin_name: "echo".to_owned(),
                parameters: serde_json::Map::from_iter([(
                    "message".to_owned(),
                    json!("second"),
                )]),
                depends_on: vec![],
            },
        ],
        reasoning: String::new(),
    };

    let err = router
        .execute_multi_step("q", Some(plan))
        .await
        .expect_err("forward dependency must be rejected");
    assert!(matches!(err, Error::MultiStepExecution { .. }));
    // Nothing ran: the echo plugin was never even loaded.
    assert!(manager.loaded_plugins().await.is_empty());
}

#[tokio::test]
async fn multi_step_plan_executes_sequentially_with_context() {
    let manager = echo_manager().await;
    let router = router_with(manager, vec![]);

    let plan = MultiStepPlan {
        steps: vec![
            PlanStep {
                plugin_name: "echo".to_owned(),
                parameters: serde_json::Map::from_iter([(
                    "message".to_owned(),
                    json!("one"),
                )]),
                depends_on: vec![],
            },
            PlanStep {
                plugin_name: "echo".to_owned(),
                parameters: serde_json::Map::from_iter([(
                    "message".to_owned(),
                    json!("two"),
                )]),
                depends_on: vec![0],
            },
        ],
        reasoning: "two echoes".to_owned(),
    };

    let responses = router
        .execute_multi_step("q", Some(plan))
        .await
        .expect("plan should run");
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].data.as_ref().expect("data")["echoed"], "one");
    assert_eq!(responses[1].data.as_ref().expect("data")["echoed"], "two");
}

#[tokio::test]
async fn analyze_complexity_defaults_to_simple_on_garbage() {
    let manager = echo_manager().await;
    let router = router_with(manager, vec!["is_complex: false\nsingle plugin suffices"]);

    let (is_complex, reasoning) = router.analyze_complexity("echo hi").await;
    assert!(!is_complex);
    assert!(reasoning.contains("single plugin"));
}

#[tokio::test]
async fn process_query_single_step_envelope() {
    let manager = echo_manager().await;
    let router = router_with(
        manager,
        vec![
            // Complexity analysis.
            "is_complex: false\nreasoning: one echo",
            // Routing decision.
            r#"{"plugin": "echo", "confidence": 0.9, "reasoning": "r", "parameters": {"message": "ping"}}"#,
        ],
    );

    let result = router.process_query("echo ping").await.expect("process");
    assert_eq!(result["type"], "single_step");
    assert_eq!(result["routing"]["plugin_name"], "echo");
    assert_eq!(result["response"]["data"]["echoed"], "ping");
}
