//! Plugin lifecycle management: discovery, lazy loading, dispatch, reload.
//!
//! Plugins are registered through a build-time constructor list (the
//! [`builtin_plugins`] registry) rather than filesystem scanning; discovery
//! instantiates a throwaway instance of each to read its metadata without
//! running initialization. Loading is lazy and per-name serialized: a plugin
//! is either being initialized, loaded, or shut down, never two at once.
//!
//! An optional `notify` watcher on the plugin directory schedules a full
//! registry reload when files change. Off by default.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::providers::factory::ProviderFactory;

use super::calculator::CalculatorPlugin;
use super::echo::EchoPlugin;
use super::linkedin::LinkedInExternalPlugin;
use super::resume::PdfResumePlugin;
use super::{Plugin, PluginMetadata, PluginRequest, PluginResponse};

/// Constructor producing a fresh plugin instance.
pub type PluginConstructor = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// The build-time plugin registry: every plugin shipped with the service.
pub fn builtin_plugins(
    settings: &Settings,
    factory: &Arc<ProviderFactory>,
) -> Vec<PluginConstructor> {
    let echo: PluginConstructor = Arc::new(|| Box::new(EchoPlugin::new()));
    let calculator: PluginConstructor = Arc::new(|| Box::new(CalculatorPlugin::new()));

    let linkedin_settings = settings.clone();
    let linkedin: PluginConstructor = Arc::new(move || {
        Box::new(LinkedInExternalPlugin::new(linkedin_settings.clone()))
    });

    let resume_settings = settings.clone();
    let resume_factory = Arc::clone(factory);
    let resume: PluginConstructor = Arc::new(move || {
        Box::new(PdfResumePlugin::new(
            resume_settings.clone(),
            Arc::clone(&resume_factory),
        ))
    });

    vec![echo, calculator, linkedin, resume]
}

type LoadedPlugin = Arc<Mutex<Box<dyn Plugin>>>;

/// Manages the lifecycle of plugins.
pub struct PluginManager {
    sources: Vec<PluginConstructor>,
    available: RwLock<HashMap<String, PluginConstructor>>,
    loaded: RwLock<HashMap<String, LoadedPlugin>>,
    plugin_directory: PathBuf,
    auto_reload: bool,
    watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugin_directory", &self.plugin_directory)
            .field("auto_reload", &self.auto_reload)
            .finish()
    }
}

impl PluginManager {
    /// Create a manager over the built-in plugin registry.
    pub fn new(settings: &Settings, factory: &Arc<ProviderFactory>) -> Self {
        Self::with_sources(settings, builtin_plugins(settings, factory))
    }

    /// Create a manager over an explicit constructor list (tests, embedders).
    pub fn with_sources(settings: &Settings, sources: Vec<PluginConstructor>) -> Self {
        Self {
            sources,
            available: RwLock::new(HashMap::new()),
            loaded: RwLock::new(HashMap::new()),
            plugin_directory: settings.plugin_directory.clone(),
            auto_reload: settings.plugin_auto_reload,
            watcher: std::sync::Mutex::new(None),
        }
    }

    /// Discover available plugins and start the watcher when enabled.
    ///
    /// # Errors
    ///
    /// Fails only when the hot-reload watcher cannot be installed.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        info!("initializing plugin manager");
        self.discover_plugins().await;

        if self.auto_reload {
            let watcher = self.setup_file_watcher().map_err(|e| Error::Configuration {
                key: "PLUGIN_AUTO_RELOAD".to_owned(),
                reason: format!("failed to start plugin watcher: {e}"),
            })?;
            if let Ok(mut slot) = self.watcher.lock() {
                *slot = Some(watcher);
            }
        }

        let count = self.available.read().await.len();
        info!(available_plugins = count, "plugin manager initialized");
        Ok(())
    }

    /// Run discovery: read metadata from a throwaway instance of every
    /// registered constructor. Conflicting names: last wins with a warning.
    pub async fn discover_plugins(&self) {
        debug!(directory = %self.plugin_directory.display(), "discovering plugins");

        let mut available = self.available.write().await;
        available.clear();

        for source in &self.sources {
            let metadata = source().metadata();
            if available.contains_key(&metadata.name) {
                warn!(
                    name = %metadata.name,
                    "duplicate plugin name discovered, replacing earlier registration"
                );
            }
            debug!(name = %metadata.name, "discovered plugin");
            available.insert(metadata.name, Arc::clone(source));
        }

        if available.is_empty() {
            warn!("no plugins discovered");
        } else {
            info!(count = available.len(), "plugin discovery completed");
        }
    }

    /// Load a plugin by name, initializing it on first use.
    ///
    /// Returns the cached instance when already loaded. An initialization
    /// failure is not cached: the next load attempt re-tries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PluginNotFound`] for unknown names and
    /// [`Error::PluginInitialization`] when initialize fails.
    pub async fn load_plugin(&self, name: &str, config: Option<&Value>) -> Result<LoadedPlugin> {
        if let Some(existing) = self.loaded.read().await.get(name) {
            debug!(name, "plugin already loaded, returning cached instance");
            return Ok(Arc::clone(existing));
        }

        let constructor = {
            let available = self.available.read().await;
            available
                .get(name)
                .cloned()
                .ok_or_else(|| Error::PluginNotFound {
                    name: name.to_owned(),
                })?
        };

        debug!(name, "loading plugin");
        let mut plugin = constructor();
        plugin
            .initialize(config)
            .await
            .map_err(|e| Error::PluginInitialization {
                name: name.to_owned(),
                reason: e.to_string(),
            })?;

        let loaded: LoadedPlugin = Arc::new(Mutex::new(plugin));
        self.loaded
            .write()
            .await
            .insert(name.to_owned(), Arc::clone(&loaded));
        info!(name, "plugin ready");
        Ok(loaded)
    }

    /// Execute a plugin with the given request, loading it when necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PluginNotFound`] for unknown plugins,
    /// [`Error::PluginValidation`] when the request fails validation (the
    /// plugin's execute is not called), and [`Error::PluginExecution`]
    /// wrapping unexpected execute failures.
    pub async fn execute_plugin(
        &self,
        name: &str,
        request: &PluginRequest,
    ) -> Result<PluginResponse> {
        let plugin = self.load_plugin(name, None).await?;
        let mut plugin = plugin.lock().await;

        if !plugin.validate_request(request) {
            return Err(Error::PluginValidation {
                name: name.to_owned(),
                request: serde_json::to_value(request).unwrap_or(Value::Null),
            });
        }

        plugin.execute(request).await.map_err(|e| {
            error!(plugin = name, action = %request.action, error = %e, "plugin execution failed");
            Error::PluginExecution {
                name: name.to_owned(),
                action: request.action.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Shut down and drop one loaded plugin. No-op for unknown names.
    pub async fn unload_plugin(&self, name: &str) {
        let removed = self.loaded.write().await.remove(name);
        if let Some(plugin) = removed {
            plugin.lock().await.shutdown().await;
            info!(name, "plugin unloaded");
        }
    }

    /// Shut down all loaded plugins, clear both registries, and re-run
    /// discovery.
    pub async fn reload_plugins(&self) {
        info!("reloading all plugins");
        self.shutdown_all_plugins().await;
        self.discover_plugins().await;
    }

    /// Shut down every loaded plugin.
    pub async fn shutdown_all_plugins(&self) {
        let names: Vec<String> = self.loaded.read().await.keys().cloned().collect();
        for name in names {
            self.unload_plugin(&name).await;
        }
    }

    /// Shut down the manager: all plugins plus the watcher.
    pub async fn shutdown(&self) {
        info!("shutting down plugin manager");
        self.shutdown_all_plugins().await;
        if let Ok(mut slot) = self.watcher.lock() {
            *slot = None;
        }
    }

    /// Names of all available plugins, sorted.
    pub async fn available_plugins(&self) -> Vec<String> {
        let mut names: Vec<String> = self.available.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of all loaded plugins, sorted.
    pub async fn loaded_plugins(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Metadata for one plugin, loaded or merely available.
    pub async fn plugin_metadata(&self, name: &str) -> Option<PluginMetadata> {
        if let Some(plugin) = self.loaded.read().await.get(name) {
            return Some(plugin.lock().await.metadata());
        }
        let available = self.available.read().await;
        available.get(name).map(|constructor| constructor().metadata())
    }

    /// Metadata for every available plugin, keyed by name.
    pub async fn all_plugin_metadata(&self) -> std::collections::BTreeMap<String, PluginMetadata> {
        let names = self.available_plugins().await;
        let mut metadata = std::collections::BTreeMap::new();
        for name in names {
            if let Some(meta) = self.plugin_metadata(&name).await {
                metadata.insert(name, meta);
            }
        }
        metadata
    }

    fn setup_file_watcher(self: &Arc<Self>) -> notify::Result<RecommendedWatcher> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PathBuf>();

        let mut watcher =
            notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
                if let Ok(evt) = event {
                    for path in evt.paths {
                        if tx.send(path).is_err() {
                            break;
                        }
                    }
                }
            })?;

        if self.plugin_directory.is_dir() {
            watcher.watch(&self.plugin_directory, RecursiveMode::NonRecursive)?;
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                let relevant = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| ext == "json" || ext == "toml");
                if relevant {
                    info!(path = %path.display(), "plugin directory changed, reloading");
                    manager.reload_plugins().await;
                }
            }
        });

        info!(dir = %self.plugin_directory.display(), "plugin hot-reload watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// A plugin whose initialize can be made to fail.
    struct FlakyPlugin {
        name: String,
        fail_init: bool,
    }

    #[async_trait]
    impl Plugin for FlakyPlugin {
        async fn initialize(&mut self, _config: Option<&Value>) -> Result<()> {
            if self.fail_init {
                Err(Error::Configuration {
                    key: "flaky".to_owned(),
                    reason: "configured to fail".to_owned(),
                })
            } else {
                Ok(())
            }
        }

        async fn execute(&mut self, request: &PluginRequest) -> Result<PluginResponse> {
            Ok(PluginResponse::success(
                &request.request_id,
                serde_json::json!({"from": self.name.clone()}),
            ))
        }

        async fn shutdown(&mut self) {}

        fn metadata(&self) -> PluginMetadata {
            PluginMetadata {
                name: self.name.clone(),
                version: "1.0.0".to_owned(),
                description: String::new(),
                author: String::new(),
                capabilities: vec![],
                required_params: Default::default(),
                optional_params: Default::default(),
                examples: vec![],
            }
        }
    }

    fn manager_with(sources: Vec<PluginConstructor>) -> Arc<PluginManager> {
        Arc::new(PluginManager::with_sources(&Settings::default(), sources))
    }

    #[tokio::test]
    async fn test_discovery_registers_builtins() {
        let settings = Settings::default();
        let factory = Arc::new(ProviderFactory::with_defaults());
        let manager = Arc::new(PluginManager::new(&settings, &factory));
        manager.initialize().await.expect("initialize");

        let available = manager.available_plugins().await;
        assert_eq!(
            available,
            vec!["calculator", "echo", "linkedin_external", "pdf_resume_parser"]
        );
        assert!(manager.loaded_plugins().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_names_last_wins() {
        let first: PluginConstructor = Arc::new(|| {
            Box::new(FlakyPlugin {
                name: "dup".to_owned(),
                fail_init: true,
            })
        });
        let second: PluginConstructor = Arc::new(|| {
            Box::new(FlakyPlugin {
                name: "dup".to_owned(),
                fail_init: false,
            })
        });

        let manager = manager_with(vec![first, second]);
        manager.initialize().await.expect("initialize");

        // The surviving registration is the second (non-failing) one.
        manager
            .load_plugin("dup", None)
            .await
            .expect("second registration should load");
    }

    #[tokio::test]
    async fn test_failed_initialization_is_not_cached() {
        let ctor: PluginConstructor = Arc::new(|| {
            Box::new(FlakyPlugin {
                name: "flaky".to_owned(),
                fail_init: true,
            })
        });
        let manager = manager_with(vec![ctor]);
        manager.initialize().await.expect("initialize");

        let err = match manager.load_plugin("flaky", None).await {
            Err(err) => err,
            Ok(_) => panic!("load should fail"),
        };
        assert!(matches!(err, Error::PluginInitialization { .. }));
        assert!(manager.loaded_plugins().await.is_empty());
    }

    #[tokio::test]
    async fn test_execute_unknown_plugin_not_found() {
        let manager = manager_with(vec![]);
        manager.initialize().await.expect("initialize");

        let err = manager
            .execute_plugin("ghost", &PluginRequest::new("run"))
            .await
            .expect_err("should fail");
        assert!(matches!(err, Error::PluginNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_execute_lazily_loads() {
        let ctor: PluginConstructor = Arc::new(|| Box::new(EchoPlugin::new()));
        let manager = manager_with(vec![ctor]);
        manager.initialize().await.expect("initialize");
        assert!(manager.loaded_plugins().await.is_empty());

        let request = PluginRequest::new("echo").with_param("message", "hi");
        let response = manager
            .execute_plugin("echo", &request)
            .await
            .expect("execute");
        assert!(response.is_success());
        assert_eq!(manager.loaded_plugins().await, vec!["echo"]);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_execute() {
        let ctor: PluginConstructor = Arc::new(|| Box::new(EchoPlugin::new()));
        let manager = manager_with(vec![ctor]);
        manager.initialize().await.expect("initialize");

        // Echo requires "message"; an empty request must be rejected before
        // execute runs.
        let err = manager
            .execute_plugin("echo", &PluginRequest::new("echo"))
            .await
            .expect_err("validation should fail");
        assert!(matches!(err, Error::PluginValidation { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_reload_clears_loaded_plugins() {
        let ctor: PluginConstructor = Arc::new(|| Box::new(EchoPlugin::new()));
        let manager = manager_with(vec![ctor]);
        manager.initialize().await.expect("initialize");

        manager
            .load_plugin("echo", None)
            .await
            .expect("load");
        assert_eq!(manager.loaded_plugins().await, vec!["echo"]);

        manager.reload_plugins().await;
        assert!(manager.loaded_plugins().await.is_empty());
        assert_eq!(manager.available_plugins().await, vec!["echo"]);
    }
}
