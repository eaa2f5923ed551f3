//! Plugin manager dispatch and lifecycle tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use straylight::config::Settings;
use straylight::error::{Error, Result};
use straylight::plugins::manager::{PluginConstructor, PluginManager};
use straylight::plugins::{
    Plugin, PluginMetadata, PluginRequest, PluginResponse,
};

/// Counts execute calls so tests can prove execute was (not) reached.
struct CountingPlugin {
    executions: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

#[async_trait]
impl Plugin for CountingPlugin {
    async fn initialize(&mut self, _config: Option<&Value>) -> Result<()> {
        Ok(())
    }

    async fn execute(&mut self, request: &PluginRequest) -> Result<PluginResponse> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(PluginResponse::success(
            &request.request_id,
            serde_json::json!({"ok": true}),
        ))
    }

    async fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "counting".to_owned(),
            version: "1.0.0".to_owned(),
            description: "counts calls".to_owned(),
            author: "tests".to_owned(),
            capabilities: vec!["count".to_owned()],
            required_params: [("needed".to_owned(), "must be present".to_owned())]
                .into_iter()
                .collect(),
            optional_params: Default::default(),
            examples: vec![],
        }
    }
}

fn counting_manager() -> (Arc<PluginManager>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let executions = Arc::new(AtomicUsize::new(0));
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let exec_handle = Arc::clone(&executions);
    let shutdown_handle = Arc::clone(&shutdowns);

    let ctor: PluginConstructor = Arc::new(move || {
        Box::new(CountingPlugin {
            executions: Arc::clone(&exec_handle),
            shutdowns: Arc::clone(&shutdown_handle),
        })
    });

    let manager = Arc::new(PluginManager::with_sources(&Settings::default(), vec![ctor]));
    (manager, executions, shutdowns)
}

#[tokio::test]
async fn invalid_request_never_reaches_execute() {
    let (manager, executions, _) = counting_manager();
    manager.initialize().await.expect("initialize");

    let err = manager
        .execute_plugin("counting", &PluginRequest::new("count"))
        .await
        .expect_err("validation should fail");

    match err {
        Error::PluginValidation { name, request } => {
            assert_eq!(name, "counting");
            assert_eq!(request["action"], "count");
        }
        other => panic!("expected PluginValidation, got: {other}"),
    }
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_request_executes_once() {
    let (manager, executions, _) = counting_manager();
    manager.initialize().await.expect("initialize");

    let request = PluginRequest::new("count").with_param("needed", "yes");
    let response = manager
        .execute_plugin("counting", &request)
        .await
        .expect("execute should succeed");

    assert!(response.is_success());
    assert_eq!(response.request_id, request.request_id);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_reaches_loaded_plugins() {
    let (manager, _, shutdowns) = counting_manager();
    manager.initialize().await.expect("initialize");

    manager
        .load_plugin("counting", None)
        .await
        .expect("load");
    manager.shutdown().await;

    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert!(manager.loaded_plugins().await.is_empty());
}

#[tokio::test]
async fn metadata_available_without_loading() {
    let (manager, _, _) = counting_manager();
    manager.initialize().await.expect("initialize");

    let metadata = manager.all_plugin_metadata().await;
    assert_eq!(metadata.len(), 1);
    assert!(metadata.contains_key("counting"));
    assert!(manager.loaded_plugins().await.is_empty());
}
