//! Reflection loop tests with a scripted LLM provider.

use std::sync::Arc;

use straylight::config::Settings;
use straylight::plugins::echo::EchoPlugin;
use straylight::plugins::manager::{PluginConstructor, PluginManager};
use straylight::routing::reflection::AgenticFramework;
use straylight::routing::SemanticRouter;

use super::router_test::ScriptedProvider;

async fn echo_manager() -> Arc<PluginManager> {
    let ctor: PluginConstructor = Arc::new(|| Box::new(EchoPlugin::new()));
    let manager = Arc::new(PluginManager::with_sources(&Settings::default(), vec![ctor]));
    manager.initialize().await.expect("manager");
    manager
}

fn framework_with(manager: Arc<PluginManager>, replies: Vec<&str>) -> AgenticFramework {
    let router = Arc::new(SemanticRouter::new(
        manager,
        ScriptedProvider::new(replies),
        "key",
        "model",
    ));
    AgenticFramework::new(router)
}

#[tokio::test]
async fn goal_extraction_falls_back_to_raw_query() {
    let manager = echo_manager().await;
    let framework = framework_with(manager, vec!["not json at all"]);

    let goal = framework.extract_goal("echo hello").await;
    assert_eq!(goal.description, "echo hello");
    assert_eq!(goal.success_criteria, vec!["Complete the requested task"]);
}

#[tokio::test]
async fn goal_extraction_parses_structured_reply() {
    let manager = echo_manager().await;
    let framework = framework_with(
        manager,
        vec![r#"{"description": "repeat a greeting", "success_criteria": ["message echoed"], "constraints": ["keep it short"]}"#],
    );

    let goal = framework.extract_goal("echo hello").await;
    assert_eq!(goal.description, "repeat a greeting");
    assert_eq!(goal.success_criteria, vec!["message echoed"]);
    assert_eq!(goal.constraints, vec!["keep it short"]);
}

#[tokio::test]
async fn reflection_loop_stops_when_goal_achieved() {
    let manager = echo_manager().await;
    // Scripted conversation: goal extraction, complexity, routing,
    // reflection. One attempt is enough: goal_achieved = true.
    let framework = framework_with(
        manager,
        vec![
            r#"{"description": "echo hi", "success_criteria": ["echoed"], "constraints": []}"#,
            "is_complex: false",
            r#"{"plugin": "echo", "confidence": 0.9, "reasoning": "r", "parameters": {"message": "hi"}}"#,
            r#"{"goal_achieved": true, "missing_aspects": [], "quality_assessment": "good", "suggested_improvements": [], "needs_retry": false}"#,
        ],
    );

    let result = framework
        .process_with_reflection("echo hi", None)
        .await
        .expect("loop should run");

    assert_eq!(result["attempts"], 1);
    assert_eq!(result["result"]["status"], "success");
    assert_eq!(result["reflection"]["goal_achieved"], true);
}

#[tokio::test]
async fn reflection_loop_honors_attempt_budget() {
    let manager = echo_manager().await;
    // Every reflection demands a retry; with a budget of 2 the loop must
    // stop after the second attempt.
    let framework = framework_with(
        manager,
        vec![
            // Goal extraction.
            r#"{"description": "echo hi", "success_criteria": [], "constraints": []}"#,
            // Attempt 1: complexity, routing, reflection (retry), improvement.
            "is_complex: false",
            r#"{"plugin": "echo", "confidence": 0.9, "reasoning": "r", "parameters": {"message": "hi"}}"#,
            r#"{"goal_achieved": false, "needs_retry": true, "retry_strategy": "try harder", "quality_assessment": "weak", "missing_aspects": [], "suggested_improvements": ["be louder"]}"#,
            "echo hi LOUDLY",
            // Attempt 2: complexity, routing, reflection (still retry).
            "is_complex: false",
            r#"{"plugin": "echo", "confidence": 0.9, "reasoning": "r", "parameters": {"message": "HI"}}"#,
            r#"{"goal_achieved": false, "needs_retry": true, "retry_strategy": "again", "quality_assessment": "weak", "missing_aspects": [], "suggested_improvements": []}"#,
        ],
    );

    let result = framework
        .process_with_reflection("echo hi", Some(2))
        .await
        .expect("loop should run");

    assert_eq!(result["attempts"], 2);
    assert_eq!(result["history"][1]["query"], "echo hi LOUDLY");
    assert_eq!(result["reflection"]["needs_retry"], true);
}

#[tokio::test]
async fn failed_execution_is_reported_not_raised() {
    // No plugins registered: routing fails, the framework folds that into a
    // failed execution result instead of erroring out of the loop.
    let manager = Arc::new(PluginManager::with_sources(&Settings::default(), vec![]));
    manager.initialize().await.expect("manager");

    let framework = framework_with(
        manager,
        vec![r#"{"description": "d", "success_criteria": [], "constraints": []}"#],
    );

    // plan() fails because routing fails with no plugins.
    let err = framework.plan("anything").await.expect_err("no plugins");
    assert_eq!(err.status_code(), 503);
}
