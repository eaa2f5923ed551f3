//! Crate-wide error taxonomy and boundary status mapping.
//!
//! Every failure mode the service can surface is a variant here, grouped the
//! same way the subsystems are: plugin lifecycle, external MCP integration,
//! routing, authentication, configuration and validation, plus the LLM
//! provider failures. The outer web layer turns an [`Error`] into a response
//! via [`Error::status_code`] and [`Error::to_body`].

use serde::Serialize;
use serde_json::{json, Value};

/// All service-level errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Plugin system ──
    /// A requested plugin is not registered.
    #[error("Plugin '{name}' not found")]
    PluginNotFound {
        /// Plugin name.
        name: String,
    },

    /// A plugin failed to initialize.
    #[error("Failed to initialize plugin '{name}': {reason}")]
    PluginInitialization {
        /// Plugin name.
        name: String,
        /// Failure detail.
        reason: String,
    },

    /// A plugin failed while executing an action.
    #[error("Plugin '{name}' failed to execute action '{action}': {reason}")]
    PluginExecution {
        /// Plugin name.
        name: String,
        /// Action that was being executed.
        action: String,
        /// Failure detail.
        reason: String,
    },

    /// A plugin request failed validation.
    #[error("Validation failed for plugin '{name}'")]
    PluginValidation {
        /// Plugin name.
        name: String,
        /// The offending request, serialized for diagnostics.
        request: Value,
    },

    /// A plugin failed to load.
    #[error("Failed to load plugin '{name}': {reason}")]
    PluginLoad {
        /// Plugin name.
        name: String,
        /// Failure detail.
        reason: String,
    },

    // ── External MCP ──
    /// Connection to an external MCP server failed.
    #[error("Failed to connect to MCP server at {server_url}: {reason}")]
    McpConnection {
        /// Server base URL.
        server_url: String,
        /// Failure detail.
        reason: String,
    },

    /// MCP session management failed.
    #[error("MCP session {operation} failed: {reason}")]
    McpSession {
        /// Session operation that failed.
        operation: String,
        /// Failure detail.
        reason: String,
        /// Session id, when one had been assigned.
        session_id: Option<String>,
    },

    /// MCP protocol communication failed.
    #[error("MCP protocol error in method '{method}': {reason}")]
    McpProtocol {
        /// JSON-RPC method.
        method: String,
        /// Failure detail.
        reason: String,
    },

    /// An MCP request timed out.
    #[error("MCP {operation} timed out after {timeout_secs} seconds")]
    McpTimeout {
        /// Operation that timed out.
        operation: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// External process management failed.
    #[error("External process '{command}' failed: {reason}")]
    ExternalProcess {
        /// Command line that was run.
        command: String,
        /// Failure detail.
        reason: String,
        /// Exit code, when the process exited.
        exit_code: Option<i32>,
    },

    // ── Routing ──
    /// No plugins are available for routing.
    #[error("No plugins available for routing")]
    NoPluginsAvailable,

    /// The semantic router could not produce a routing decision.
    #[error("Failed to route query: {reason}")]
    RoutingDecision {
        /// The query being routed.
        query: String,
        /// Failure detail.
        reason: String,
    },

    /// A multi-step plan failed validation or execution.
    #[error("Multi-step execution failed at step {step}/{total_steps}: {reason}")]
    MultiStepExecution {
        /// 1-based index of the failing step.
        step: usize,
        /// Total number of steps in the plan.
        total_steps: usize,
        /// Failure detail.
        reason: String,
    },

    // ── Authentication (constructed by the outer web layer) ──
    /// Credentials did not match a known user.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The user account is inactive.
    #[error("User account '{username}' is inactive")]
    InactiveUser {
        /// Account name.
        username: String,
    },

    /// The user lacks a required scope.
    #[error("Insufficient permissions")]
    InsufficientPermissions {
        /// Scopes the endpoint requires.
        required_scopes: Vec<String>,
    },

    /// A user with this name already exists.
    #[error("User '{username}' already exists")]
    UserAlreadyExists {
        /// Account name.
        username: String,
    },

    // ── Configuration and validation ──
    /// A configuration value is missing or invalid.
    #[error("Configuration error for '{key}': {reason}")]
    Configuration {
        /// Configuration key or environment variable.
        key: String,
        /// Failure detail.
        reason: String,
    },

    /// Input validation failed.
    #[error("Validation failed for field '{field}': {reason}")]
    Validation {
        /// Field that failed validation.
        field: String,
        /// Failure detail.
        reason: String,
    },

    /// A calculator expression was rejected.
    #[error("{reason}")]
    ExpressionValidation {
        /// The rejected expression.
        expression: String,
        /// Rejection detail.
        reason: String,
    },

    // ── LLM providers ──
    /// The provider rejected the API key.
    #[error("{provider} API authentication error. Please check your API key.")]
    ProviderAuthentication {
        /// Provider name.
        provider: String,
    },

    /// The provider rate limit was exceeded.
    #[error("{provider} API rate limit exceeded. Please try again later.")]
    ProviderRateLimited {
        /// Provider name.
        provider: String,
    },

    /// The provider returned a 5xx status.
    #[error("{provider} API server error (status {status}). Please try again later.")]
    ProviderUpstream {
        /// Provider name.
        provider: String,
        /// HTTP status code returned.
        status: u16,
    },

    /// The provider returned an unexpected non-success response.
    #[error("{provider} API error (status {status}): {body}")]
    ProviderResponse {
        /// Provider name.
        provider: String,
        /// HTTP status code returned.
        status: u16,
        /// Decoded response body.
        body: String,
    },

    /// A provider request timed out.
    #[error("{provider} API request timed out after {timeout_secs}s")]
    ProviderTimeout {
        /// Provider name.
        provider: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// The provider could not be reached at the transport level.
    #[error("Error communicating with {provider} API: {reason}")]
    ProviderConnection {
        /// Provider name.
        provider: String,
        /// Transport failure detail.
        reason: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Serializable error body returned at the API boundary.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error class name (the variant name).
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Structured error context.
    pub details: Value,
    /// Underlying cause, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl Error {
    /// Variant class name, used as the `error` field of the wire body.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::PluginNotFound { .. } => "PluginNotFoundError",
            Self::PluginInitialization { .. } => "PluginInitializationError",
            Self::PluginExecution { .. } => "PluginExecutionError",
            Self::PluginValidation { .. } => "PluginValidationError",
            Self::PluginLoad { .. } => "PluginLoadError",
            Self::McpConnection { .. } => "MCPConnectionError",
            Self::McpSession { .. } => "MCPSessionError",
            Self::McpProtocol { .. } => "MCPProtocolError",
            Self::McpTimeout { .. } => "MCPTimeoutError",
            Self::ExternalProcess { .. } => "ExternalProcessError",
            Self::NoPluginsAvailable => "NoPluginsAvailableError",
            Self::RoutingDecision { .. } => "RoutingDecisionError",
            Self::MultiStepExecution { .. } => "MultiStepExecutionError",
            Self::InvalidCredentials => "InvalidCredentialsError",
            Self::InactiveUser { .. } => "InactiveUserError",
            Self::InsufficientPermissions { .. } => "InsufficientPermissionsError",
            Self::UserAlreadyExists { .. } => "UserAlreadyExistsError",
            Self::Configuration { .. } => "ConfigurationError",
            Self::Validation { .. } => "ValidationError",
            Self::ExpressionValidation { .. } => "ExpressionValidationError",
            Self::ProviderAuthentication { .. } => "ProviderAuthenticationError",
            Self::ProviderRateLimited { .. } => "ProviderRateLimitError",
            Self::ProviderUpstream { .. } => "ProviderUpstreamError",
            Self::ProviderResponse { .. } => "ProviderError",
            Self::ProviderTimeout { .. } => "ProviderTimeoutError",
            Self::ProviderConnection { .. } => "ProviderConnectionError",
        }
    }

    /// HTTP status code this error maps to at the system boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::PluginNotFound { .. } => 404,
            Self::PluginValidation { .. } | Self::Validation { .. } => 400,
            Self::ExpressionValidation { .. } => 400,
            Self::McpConnection { .. } | Self::NoPluginsAvailable => 503,
            Self::McpProtocol { .. } => 502,
            Self::McpTimeout { .. } => 504,
            Self::InvalidCredentials => 401,
            Self::InactiveUser { .. } | Self::InsufficientPermissions { .. } => 403,
            Self::UserAlreadyExists { .. } => 409,
            Self::ProviderAuthentication { .. } => 401,
            Self::ProviderRateLimited { .. } => 429,
            Self::ProviderUpstream { .. } => 502,
            Self::ProviderTimeout { .. } => 504,
            Self::ProviderConnection { .. } => 503,
            Self::Configuration { .. }
            | Self::PluginExecution { .. }
            | Self::PluginInitialization { .. }
            | Self::RoutingDecision { .. } => 500,
            _ => 500,
        }
    }

    /// Structured context for the wire body's `details` field.
    pub fn details(&self) -> Value {
        match self {
            Self::PluginNotFound { name } => json!({ "plugin_name": name }),
            Self::PluginInitialization { name, reason } => {
                json!({ "plugin_name": name, "reason": reason })
            }
            Self::PluginExecution {
                name,
                action,
                reason,
            } => json!({ "plugin_name": name, "action": action, "reason": reason }),
            Self::PluginValidation { name, request } => {
                json!({ "plugin_name": name, "request": request })
            }
            Self::PluginLoad { name, reason } => {
                json!({ "plugin_name": name, "reason": reason })
            }
            Self::McpConnection { server_url, reason } => {
                json!({ "server_url": server_url, "reason": reason })
            }
            Self::McpSession {
                operation,
                reason,
                session_id,
            } => json!({ "operation": operation, "reason": reason, "session_id": session_id }),
            Self::McpProtocol { method, reason } => {
                json!({ "method": method, "reason": reason })
            }
            Self::McpTimeout {
                operation,
                timeout_secs,
            } => json!({ "operation": operation, "timeout": timeout_secs }),
            Self::ExternalProcess {
                command,
                reason,
                exit_code,
            } => json!({ "command": command, "reason": reason, "exit_code": exit_code }),
            Self::NoPluginsAvailable => json!({}),
            Self::RoutingDecision { query, reason } => {
                json!({ "query": query, "reason": reason })
            }
            Self::MultiStepExecution {
                step,
                total_steps,
                reason,
            } => json!({ "step": step, "total_steps": total_steps, "reason": reason }),
            Self::InvalidCredentials => json!({}),
            Self::InactiveUser { username } | Self::UserAlreadyExists { username } => {
                json!({ "username": username })
            }
            Self::InsufficientPermissions { required_scopes } => {
                json!({ "required_scopes": required_scopes })
            }
            Self::Configuration { key, reason } => {
                json!({ "config_key": key, "reason": reason })
            }
            Self::Validation { field, reason } => {
                json!({ "field": field, "reason": reason })
            }
            Self::ExpressionValidation { expression, reason } => {
                json!({ "expression": expression, "reason": reason })
            }
            Self::ProviderAuthentication { provider }
            | Self::ProviderRateLimited { provider } => json!({ "provider": provider }),
            Self::ProviderUpstream { provider, status } => {
                json!({ "provider": provider, "status": status })
            }
            Self::ProviderResponse {
                provider,
                status,
                body,
            } => json!({ "provider": provider, "status": status, "body": body }),
            Self::ProviderTimeout {
                provider,
                timeout_secs,
            } => json!({ "provider": provider, "timeout": timeout_secs }),
            Self::ProviderConnection { provider, reason } => {
                json!({ "provider": provider, "reason": reason })
            }
        }
    }

    /// Build the serializable boundary body for this error.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.class_name().to_owned(),
            message: self.to_string(),
            details: self.details(),
            cause: None,
        }
    }
}
