//! Provider factory: name → adapter constructor registry.
//!
//! The factory builds a fresh, stateless adapter per call so no request
//! state ever crosses between evaluations. Third-party adapters can be
//! registered at startup alongside the built-in pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

use super::anthropic::AnthropicProvider;
use super::openai::OpenAiProvider;
use super::LlmProvider;

/// Constructor for a provider adapter with a per-request timeout.
pub type ProviderConstructor =
    Arc<dyn Fn(Duration) -> Result<Arc<dyn LlmProvider>> + Send + Sync>;

/// Registry of available LLM providers.
pub struct ProviderFactory {
    registry: HashMap<String, ProviderConstructor>,
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("providers", &self.provider_names())
            .finish()
    }
}

fn make_openai(timeout: Duration) -> Result<Arc<dyn LlmProvider>> {
    Ok(Arc::new(OpenAiProvider::new(timeout)?))
}

fn make_anthropic(timeout: Duration) -> Result<Arc<dyn LlmProvider>> {
    Ok(Arc::new(AnthropicProvider::new(timeout)?))
}

impl ProviderFactory {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// Create a registry with the built-in providers registered.
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register("openai", make_openai);
        factory.register("anthropic", make_anthropic);
        factory
    }

    /// Register (or replace) a provider constructor under `name`.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(Duration) -> Result<Arc<dyn LlmProvider>> + Send + Sync + 'static,
    {
        self.registry.insert(name.to_owned(), Arc::new(constructor));
    }

    /// Build a fresh adapter for `name` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown provider name.
    pub fn get(&self, name: &str, timeout: Duration) -> Result<Arc<dyn LlmProvider>> {
        let constructor = self.registry.get(name).ok_or_else(|| Error::Validation {
            field: "provider".to_owned(),
            reason: format!("Invalid provider: {name}"),
        })?;
        constructor(timeout)
    }

    /// Names of all registered providers, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}
