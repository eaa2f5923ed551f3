//! Echo plugin: returns its input with optional transformations.
//!
//! Serves as a smoke test for the plugin contract and as a dependency-free
//! routing target.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;

use super::{Plugin, PluginExample, PluginMetadata, PluginRequest, PluginResponse};

/// A plugin that echoes back the input with optional transformations.
#[derive(Debug, Default)]
pub struct EchoPlugin {
    initialized: bool,
}

impl EchoPlugin {
    /// Create the plugin.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Plugin for EchoPlugin {
    async fn initialize(&mut self, config: Option<&Value>) -> Result<()> {
        info!(?config, "initializing echo plugin");
        self.initialized = true;
        Ok(())
    }

    async fn execute(&mut self, request: &PluginRequest) -> Result<PluginResponse> {
        let message = request.param_str("message").unwrap_or_default().to_owned();
        let uppercase = request.param_bool("uppercase");
        let repeat = request
            .parameters
            .get("repeat")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        let prefix = request.param_str("prefix").unwrap_or_default().to_owned();
        let suffix = request.param_str("suffix").unwrap_or_default().to_owned();

        let mut result = message.clone();
        if uppercase {
            result = result.to_uppercase();
        }
        if !prefix.is_empty() {
            result = format!("{prefix}{result}");
        }
        if !suffix.is_empty() {
            result = format!("{result}{suffix}");
        }
        if repeat > 1 {
            let copies = usize::try_from(repeat).unwrap_or(1);
            result = vec![result; copies].join(" ");
        }

        info!(original = %message, result = %result, "echo plugin executed");

        Ok(PluginResponse::success(
            &request.request_id,
            json!({
                "original": message,
                "echoed": result,
                "transformations_applied": {
                    "uppercase": uppercase,
                    "repeat": repeat,
                    "prefix": !prefix.is_empty(),
                    "suffix": !suffix.is_empty(),
                }
            }),
        )
        .with_metadata("plugin", "echo"))
    }

    async fn shutdown(&mut self) {
        info!("shutting down echo plugin");
        self.initialized = false;
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "echo".to_owned(),
            version: "1.0.0".to_owned(),
            description: "Echoes back the input with optional transformations".to_owned(),
            author: "Straylight Team".to_owned(),
            capabilities: vec![
                "echo".to_owned(),
                "repeat".to_owned(),
                "transform".to_owned(),
                "test".to_owned(),
            ],
            required_params: [("message".to_owned(), "The message to echo".to_owned())]
                .into_iter()
                .collect(),
            optional_params: [
                (
                    "uppercase".to_owned(),
                    "Convert to uppercase (boolean)".to_owned(),
                ),
                (
                    "repeat".to_owned(),
                    "Number of times to repeat (integer)".to_owned(),
                ),
                ("prefix".to_owned(), "Prefix to add to the message".to_owned()),
                ("suffix".to_owned(), "Suffix to add to the message".to_owned()),
            ]
            .into_iter()
            .collect(),
            examples: vec![
                PluginExample {
                    query: "Echo 'Hello World'".to_owned(),
                    parameters: json!({"message": "Hello World"}),
                },
                PluginExample {
                    query: "Repeat 'Hi' 3 times in uppercase".to_owned(),
                    parameters: json!({"message": "Hi", "repeat": 3, "uppercase": true}),
                },
            ],
        }
    }
}
