//! Plugin system: the uniform plugin contract and the concrete plugins.
//!
//! A plugin exposes a fixed set of operations (initialize, execute,
//! shutdown, metadata, request validation) behind the [`Plugin`] trait.
//! Expected failure modes are returned as error-status [`PluginResponse`]s;
//! an `Err` from [`Plugin::execute`] means a bug or infrastructure fault and
//! is wrapped by the manager into a typed execution error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::Result;

pub mod calculator;
pub mod echo;
pub mod linkedin;
pub mod manager;
pub mod resume;

pub use manager::PluginManager;

/// Example usage scenario advertised in plugin metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginExample {
    /// Natural-language query the example answers.
    pub query: String,
    /// Parameters the plugin would be invoked with.
    pub parameters: Value,
}

/// Metadata describing a plugin's identity and capabilities.
///
/// Immutable after construction; read by the plugin manager and the
/// semantic router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique name of the plugin (registry key).
    pub name: String,
    /// Plugin version (semantic versioning).
    pub version: String,
    /// Brief description of plugin functionality.
    pub description: String,
    /// Plugin author or team.
    pub author: String,
    /// Capability keywords used by the semantic router.
    pub capabilities: Vec<String>,
    /// Required parameters and their descriptions.
    #[serde(default)]
    pub required_params: std::collections::BTreeMap<String, String>,
    /// Optional parameters and their descriptions.
    #[serde(default)]
    pub optional_params: std::collections::BTreeMap<String, String>,
    /// Example usage scenarios.
    #[serde(default)]
    pub examples: Vec<PluginExample>,
}

/// Standard request format for plugin execution. Constructed per invocation
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// Generated unique request token.
    pub request_id: String,
    /// Request creation time.
    pub timestamp: DateTime<Utc>,
    /// The action to perform.
    pub action: String,
    /// Parameters for the action.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Additional context from the router (e.g. previous step results).
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl PluginRequest {
    /// Build a request for `action` with a generated id.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            request_id: format!("req_{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            action: action.into(),
            parameters: Map::new(),
            context: Map::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_owned(), value.into());
        self
    }

    /// Fetch a string parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Fetch a boolean parameter, defaulting to `false`.
    pub fn param_bool(&self, key: &str) -> bool {
        self.parameters
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Status of a plugin execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    /// The action completed.
    Success,
    /// The action failed in an expected way.
    Error,
    /// The action completed partially.
    Partial,
}

/// Standard response format from plugin execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    /// Id of the request this answers.
    pub request_id: String,
    /// Response creation time.
    pub timestamp: DateTime<Utc>,
    /// Execution status.
    pub status: PluginStatus,
    /// Response data payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message when status is [`PluginStatus::Error`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Additional metadata about the response.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl PluginResponse {
    /// Build a success response.
    pub fn success(request_id: &str, data: Value) -> Self {
        Self {
            request_id: request_id.to_owned(),
            timestamp: Utc::now(),
            status: PluginStatus::Success,
            data: Some(data),
            error: None,
            metadata: Map::new(),
        }
    }

    /// Build an error response.
    pub fn error(request_id: &str, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.to_owned(),
            timestamp: Utc::now(),
            status: PluginStatus::Error,
            data: None,
            error: Some(message.into()),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }

    /// Whether the execution succeeded.
    pub fn is_success(&self) -> bool {
        self.status == PluginStatus::Success
    }
}

/// The uniform plugin contract.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Initialize the plugin with optional configuration. Called exactly
    /// once per lifetime, before the first execute.
    ///
    /// # Errors
    ///
    /// Returns an error when the plugin cannot become operational (missing
    /// configuration, external server failed to start).
    async fn initialize(&mut self, config: Option<&Value>) -> Result<()>;

    /// Execute the plugin's main functionality.
    ///
    /// Expected failure modes come back as an error-status response;
    /// an `Err` is reserved for bugs and infrastructure faults.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected failures.
    async fn execute(&mut self, request: &PluginRequest) -> Result<PluginResponse>;

    /// Gracefully shut down the plugin and release its resources.
    async fn shutdown(&mut self);

    /// The plugin's metadata.
    fn metadata(&self) -> PluginMetadata;

    /// Validate a request against the plugin's requirements: every required
    /// parameter named in metadata must be present.
    fn validate_request(&self, request: &PluginRequest) -> bool {
        let metadata = self.metadata();
        metadata
            .required_params
            .keys()
            .all(|param| request.parameters.contains_key(param))
    }
}
