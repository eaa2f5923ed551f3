//! Echo plugin contract tests.

use serde_json::json;

use straylight::plugins::echo::EchoPlugin;
use straylight::plugins::{Plugin, PluginRequest, PluginStatus};

#[tokio::test]
async fn echo_with_transforms() {
    let mut plugin = EchoPlugin::new();
    plugin.initialize(None).await.expect("initialize");

    let request = PluginRequest::new("echo")
        .with_param("message", "hi")
        .with_param("uppercase", true)
        .with_param("repeat", 3);
    let response = plugin.execute(&request).await.expect("execute");

    assert_eq!(response.status, PluginStatus::Success);
    let data = response.data.expect("data");
    assert_eq!(data["original"], "hi");
    assert_eq!(data["echoed"], "HI HI HI");
    assert_eq!(
        data["transformations_applied"],
        json!({"uppercase": true, "repeat": 3, "prefix": false, "suffix": false})
    );
}

#[tokio::test]
async fn echo_prefix_and_suffix() {
    let mut plugin = EchoPlugin::new();
    plugin.initialize(None).await.expect("initialize");

    let request = PluginRequest::new("echo")
        .with_param("message", "mid")
        .with_param("prefix", ">>")
        .with_param("suffix", "<<");
    let response = plugin.execute(&request).await.expect("execute");

    let data = response.data.expect("data");
    assert_eq!(data["echoed"], ">>mid<<");
    assert_eq!(data["transformations_applied"]["prefix"], true);
    assert_eq!(data["transformations_applied"]["suffix"], true);
}

#[tokio::test]
async fn echo_plain_message_untouched() {
    let mut plugin = EchoPlugin::new();
    plugin.initialize(None).await.expect("initialize");

    let request = PluginRequest::new("echo").with_param("message", "Hello World");
    let response = plugin.execute(&request).await.expect("execute");
    assert_eq!(response.data.expect("data")["echoed"], "Hello World");
}

#[test]
fn validate_requires_message() {
    let plugin = EchoPlugin::new();
    assert!(!plugin.validate_request(&PluginRequest::new("echo")));
    assert!(plugin.validate_request(&PluginRequest::new("echo").with_param("message", "x")));
}
