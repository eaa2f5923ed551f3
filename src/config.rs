//! Configuration loaded from the process environment.
//!
//! [`Settings`] materialises the whole environment surface once at startup
//! and is passed by reference (or `Arc`) to every constructor that needs it.
//! There are no module-level globals: code that needs a setting receives it
//! explicitly.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default request timeout for LLM calls, in seconds.
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 48;
/// Default request timeout for the OpenAI provider, in seconds.
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;
/// Default max-tokens ceiling shared by both vendors.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Service configuration, read from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Default LLM provider name (`openai` or `anthropic`).
    pub llm_provider: String,
    /// Default model override applied to any provider.
    pub llm_model: Option<String>,
    /// Default sampling temperature.
    pub llm_temperature: f32,
    /// Default max-tokens override.
    pub llm_max_tokens: Option<u32>,
    /// General LLM request timeout in seconds.
    pub llm_timeout_secs: u64,

    /// OpenAI API key.
    pub openai_api_key: String,
    /// Default OpenAI model.
    pub openai_model: String,
    /// OpenAI max-tokens ceiling.
    pub openai_max_tokens: u32,
    /// OpenAI-specific request timeout in seconds.
    pub openai_timeout_secs: Option<u64>,

    /// Anthropic API key.
    pub anthropic_api_key: String,
    /// Default Anthropic model.
    pub anthropic_model: String,
    /// Anthropic max-tokens ceiling.
    pub anthropic_max_tokens: u32,

    /// Cheap Anthropic model used for resume parsing.
    pub pdf_parsing_model_anthropic: String,
    /// Cheap OpenAI model used for resume parsing.
    pub pdf_parsing_model_openai: String,

    /// LinkedIn session cookie passed to the external profile server.
    pub linkedin_cookie: Option<String>,
    /// Pre-existing profile server URL (container mode).
    pub linkedin_external_server_url: Option<String>,
    /// Whether the service runs in a container with a shared profile server.
    pub docker_env: bool,

    /// Directory watched for plugin changes.
    pub plugin_directory: PathBuf,
    /// Whether the plugin hot-reload watcher is enabled.
    pub plugin_auto_reload: bool,
    /// Per-plugin operation timeout in seconds.
    pub plugin_timeout_secs: u64,
    /// Retry budget for external MCP calls.
    pub plugin_max_retries: u32,

    /// Token-signing secret consumed by the outer auth layer.
    pub secret_key: String,
    /// Access token lifetime in minutes.
    pub access_token_expire_minutes: u64,
    /// Token-signing algorithm name.
    pub algorithm: String,

    /// Allowed CORS origins, consumed by the outer web layer.
    pub cors_origins: Vec<String>,
    /// Allowed CORS methods.
    pub cors_methods: Vec<String>,
    /// Allowed CORS headers.
    pub cors_headers: Vec<String>,

    /// Log level filter (`error`..`trace`).
    pub log_level: String,
    /// Log format (`text` or `json`).
    pub log_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_provider: "openai".to_owned(),
            llm_model: None,
            llm_temperature: 0.0,
            llm_max_tokens: None,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_owned(),
            openai_max_tokens: DEFAULT_MAX_TOKENS,
            openai_timeout_secs: Some(DEFAULT_OPENAI_TIMEOUT_SECS),
            anthropic_api_key: String::new(),
            anthropic_model: "claude-3-opus-20240229".to_owned(),
            anthropic_max_tokens: DEFAULT_MAX_TOKENS,
            pdf_parsing_model_anthropic: "claude-3-5-haiku-20241022".to_owned(),
            pdf_parsing_model_openai: "gpt-4o-mini".to_owned(),
            linkedin_cookie: None,
            linkedin_external_server_url: None,
            docker_env: false,
            plugin_directory: PathBuf::from("plugins"),
            plugin_auto_reload: false,
            plugin_timeout_secs: 30,
            plugin_max_retries: 3,
            secret_key: String::new(),
            access_token_expire_minutes: 30,
            algorithm: "HS256".to_owned(),
            cors_origins: vec!["*".to_owned()],
            cors_methods: vec!["*".to_owned()],
            cors_headers: vec!["*".to_owned()],
            log_level: "info".to_owned(),
            log_format: "text".to_owned(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            llm_provider: var_or("LLM_PROVIDER", defaults.llm_provider),
            llm_model: var_opt("LLM_MODEL"),
            llm_temperature: var_parsed("LLM_TEMPERATURE", defaults.llm_temperature),
            llm_max_tokens: var_opt("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()),
            llm_timeout_secs: var_parsed("LLM_TIMEOUT", defaults.llm_timeout_secs),
            openai_api_key: var_or("OPENAI_API_KEY", defaults.openai_api_key),
            openai_model: var_or("OPENAI_MODEL", defaults.openai_model),
            openai_max_tokens: var_parsed("OPENAI_MAX_TOKENS", defaults.openai_max_tokens),
            openai_timeout_secs: var_opt("OPENAI_TIMEOUT")
                .and_then(|v| v.parse().ok())
                .or(defaults.openai_timeout_secs),
            anthropic_api_key: var_or("ANTHROPIC_API_KEY", defaults.anthropic_api_key),
            anthropic_model: var_or("ANTHROPIC_MODEL", defaults.anthropic_model),
            anthropic_max_tokens: var_parsed("ANTHROPIC_MAX_TOKENS", defaults.anthropic_max_tokens),
            pdf_parsing_model_anthropic: var_or(
                "PDF_PARSING_MODEL_ANTHROPIC",
                defaults.pdf_parsing_model_anthropic,
            ),
            pdf_parsing_model_openai: var_or(
                "PDF_PARSING_MODEL_OPENAI",
                defaults.pdf_parsing_model_openai,
            ),
            linkedin_cookie: var_opt("LINKEDIN_COOKIE"),
            linkedin_external_server_url: var_opt("LINKEDIN_EXTERNAL_SERVER_URL"),
            docker_env: var_opt("DOCKER_ENV").as_deref() == Some("true"),
            plugin_directory: var_opt("PLUGIN_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or(defaults.plugin_directory),
            plugin_auto_reload: var_opt("PLUGIN_AUTO_RELOAD").as_deref() == Some("true"),
            plugin_timeout_secs: var_parsed("PLUGIN_TIMEOUT", defaults.plugin_timeout_secs),
            plugin_max_retries: var_parsed("PLUGIN_MAX_RETRIES", defaults.plugin_max_retries),
            secret_key: var_or("SECRET_KEY", defaults.secret_key),
            access_token_expire_minutes: var_parsed(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                defaults.access_token_expire_minutes,
            ),
            algorithm: var_or("ALGORITHM", defaults.algorithm),
            cors_origins: var_list("CORS_ORIGINS", defaults.cors_origins),
            cors_methods: var_list("CORS_METHODS", defaults.cors_methods),
            cors_headers: var_list("CORS_HEADERS", defaults.cors_headers),
            log_level: var_or("LOG_LEVEL", defaults.log_level),
            log_format: var_or("LOG_FORMAT", defaults.log_format),
        }
    }

    /// Resolve the API key for `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no key is configured for the
    /// provider, or the provider is unknown.
    pub fn llm_api_key(&self, provider: &str) -> Result<String> {
        match provider {
            "openai" => {
                if self.openai_api_key.is_empty() {
                    return Err(Error::Configuration {
                        key: "OPENAI_API_KEY".to_owned(),
                        reason: "OpenAI API key not configured".to_owned(),
                    });
                }
                Ok(self.openai_api_key.clone())
            }
            "anthropic" => {
                if self.anthropic_api_key.is_empty() {
                    return Err(Error::Configuration {
                        key: "ANTHROPIC_API_KEY".to_owned(),
                        reason: "Anthropic API key not configured".to_owned(),
                    });
                }
                Ok(self.anthropic_api_key.clone())
            }
            other => Err(Error::Configuration {
                key: "LLM_PROVIDER".to_owned(),
                reason: format!("unknown provider '{other}'"),
            }),
        }
    }

    /// Resolve the default model for `provider`.
    ///
    /// `LLM_MODEL` overrides vendor defaults when set.
    pub fn llm_model(&self, provider: &str) -> String {
        if let Some(model) = &self.llm_model {
            return model.clone();
        }
        match provider {
            "anthropic" => self.anthropic_model.clone(),
            _ => self.openai_model.clone(),
        }
    }

    /// Request timeout for `provider`: vendor override falling back to the
    /// general LLM timeout.
    pub fn timeout_for(&self, provider: &str) -> Duration {
        let secs = match provider {
            "openai" => self.openai_timeout_secs.unwrap_or(self.llm_timeout_secs),
            _ => self.llm_timeout_secs,
        };
        Duration::from_secs(secs)
    }

    /// Max-tokens ceiling for `provider`: vendor setting, then the general
    /// override, then the shared default.
    pub fn max_tokens_for(&self, provider: &str) -> u32 {
        match provider {
            "openai" => self.openai_max_tokens,
            "anthropic" => self.anthropic_max_tokens,
            _ => self.llm_max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    /// Cheap model used for resume parsing with `provider`.
    pub fn pdf_parsing_model(&self, provider: &str) -> String {
        match provider {
            "anthropic" => self.pdf_parsing_model_anthropic.clone(),
            _ => self.pdf_parsing_model_openai.clone(),
        }
    }
}

fn var_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn var_or(name: &str, default: String) -> String {
    var_opt(name).unwrap_or(default)
}

fn var_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    var_opt(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn var_list(name: &str, default: Vec<String>) -> Vec<String> {
    match var_opt(name) {
        Some(raw) => raw
            .split(',')
            .map(|part| part.trim().to_owned())
            .filter(|part| !part.is_empty())
            .collect(),
        None => default,
    }
}
