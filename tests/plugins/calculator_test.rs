//! Calculator plugin contract tests.

use serde_json::json;

use straylight::plugins::calculator::CalculatorPlugin;
use straylight::plugins::{Plugin, PluginRequest, PluginStatus};

async fn run(expression: &str) -> straylight::plugins::PluginResponse {
    let mut plugin = CalculatorPlugin::new();
    plugin.initialize(None).await.expect("initialize");
    let request = PluginRequest::new("calculate").with_param("expression", expression);
    plugin.execute(&request).await.expect("execute")
}

#[tokio::test]
async fn calculate_happy_path() {
    let response = run("2 + 2").await;

    assert_eq!(response.status, PluginStatus::Success);
    let data = response.data.expect("data");
    assert_eq!(data["expression"], "2 + 2");
    assert_eq!(data["result"], json!(4));
    assert_eq!(data["type"], "int");
}

#[tokio::test]
async fn calculate_float_result() {
    let response = run("7 / 2").await;
    let data = response.data.expect("data");
    assert_eq!(data["result"], json!(3.5));
    assert_eq!(data["type"], "float");
}

#[tokio::test]
async fn calculate_with_functions_and_constants() {
    let response = run("round(pi * 5**2)").await;
    let data = response.data.expect("data");
    assert_eq!(data["result"], json!(79));
    assert_eq!(data["type"], "int");
}

#[tokio::test]
async fn rejects_unsafe_expression() {
    let response = run("__import__('os').system('ls')").await;

    assert_eq!(response.status, PluginStatus::Error);
    let error = response.error.expect("error message");
    assert!(
        error.contains("Unsupported node type") || error.contains("Unsafe function call"),
        "unexpected error: {error}"
    );
}

#[tokio::test]
async fn rejects_unknown_variable() {
    let response = run("secrets + 1").await;
    let error = response.error.expect("error message");
    assert!(error.contains("Unsafe name: secrets"), "{error}");
}

#[tokio::test]
async fn missing_expression_is_error_response() {
    let mut plugin = CalculatorPlugin::new();
    plugin.initialize(None).await.expect("initialize");
    let response = plugin
        .execute(&PluginRequest::new("calculate"))
        .await
        .expect("execute");
    assert_eq!(response.status, PluginStatus::Error);
    assert_eq!(response.error.as_deref(), Some("No expression provided"));
}

#[test]
fn metadata_names_required_params() {
    let plugin = CalculatorPlugin::new();
    let metadata = plugin.metadata();
    assert_eq!(metadata.name, "calculator");
    assert!(metadata.required_params.contains_key("expression"));
    assert!(metadata.capabilities.contains(&"calculate".to_owned()));
}
