//! Profile-fetch plugin backed by an external LinkedIn MCP server.
//!
//! The plugin owns the whole external-provider stack for one server: in
//! local mode it spawns the bundled server through
//! [`ExternalMcpProcess`] with the session cookie on the command line; in
//! container mode (`DOCKER_ENV=true`) it connects to a shared server at
//! `LINKEDIN_EXTERNAL_SERVER_URL`. Only two external tools are ever invoked:
//! `get_person_profile` and `get_company_profile`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::mcp::{ExternalMcpClient, ExternalMcpProcess};

use super::{Plugin, PluginExample, PluginMetadata, PluginRequest, PluginResponse};

/// Port the spawned server binds, chosen to avoid clashing with the common
/// 8080 default.
const LINKEDIN_MCP_PORT: u16 = 8081;
const DEFAULT_MCP_HOST: &str = "127.0.0.1";
/// Profile scrapes routinely take minutes.
const LINKEDIN_TIMEOUT: Duration = Duration::from_secs(300);
/// One attempt only: retrying a five-minute scrape compounds the damage.
const LINKEDIN_MAX_RETRIES: u32 = 1;
/// The server drives a real browser and needs extra startup time.
const LINKEDIN_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

const TOOL_PERSON_PROFILE: &str = "get_person_profile";
const TOOL_COMPANY_PROFILE: &str = "get_company_profile";

/// Relative locations the bundled server is looked up at.
const SERVER_CANDIDATE_PATHS: [&str; 2] = [
    "external/linkedin-mcp-server/main.py",
    "external/linkedin-mcp-server/linkedin_mcp_server/main.py",
];

/// LinkedIn profile and company scraper via an external MCP server.
pub struct LinkedInExternalPlugin {
    settings: Settings,
    process: Option<ExternalMcpProcess>,
    client: Option<ExternalMcpClient>,
    cookie: Option<String>,
    initialized: bool,
}

impl std::fmt::Debug for LinkedInExternalPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedInExternalPlugin")
            .field("initialized", &self.initialized)
            .field("has_process", &self.process.is_some())
            .field("has_client", &self.client.is_some())
            .finish()
    }
}

impl LinkedInExternalPlugin {
    /// Create the plugin; the external server is started in `initialize`.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            process: None,
            client: None,
            cookie: None,
            initialized: false,
        }
    }

    fn find_server(&self) -> Option<PathBuf> {
        for candidate in SERVER_CANDIDATE_PATHS {
            let path = PathBuf::from(candidate);
            if path.exists() {
                info!(path = %path.display(), "found LinkedIn MCP server");
                return Some(path);
            }
        }
        error!("LinkedIn MCP server not found in expected locations");
        None
    }

    async fn setup_external_server(&mut self, config: Option<&Value>) -> Result<String> {
        if self.settings.docker_env {
            // Container mode: a shared server instance already exists.
            let url = self
                .settings
                .linkedin_external_server_url
                .clone()
                .ok_or_else(|| Error::Configuration {
                    key: "LINKEDIN_EXTERNAL_SERVER_URL".to_owned(),
                    reason: "LINKEDIN_EXTERNAL_SERVER_URL not set in container mode".to_owned(),
                })?;
            info!(url = %url, "using external LinkedIn MCP server in container network");
            self.process = None;
            return Ok(url);
        }

        let mut host = DEFAULT_MCP_HOST.to_owned();
        let mut port = LINKEDIN_MCP_PORT;
        if let Some(config) = config {
            if let Some(h) = config.get("external_server_host").and_then(Value::as_str) {
                host = h.to_owned();
            }
            if let Some(p) = config.get("external_server_port").and_then(Value::as_u64) {
                port = u16::try_from(p).unwrap_or(LINKEDIN_MCP_PORT);
            }
        }

        let server_path = self.find_server().ok_or_else(|| Error::Configuration {
            key: "linkedin_server_path".to_owned(),
            reason: "LinkedIn MCP server not found; ensure external/linkedin-mcp-server exists"
                .to_owned(),
        })?;

        let cookie = self.cookie.clone().unwrap_or_default();
        // Cookie on the command line plus --no-lazy-init so an expired cookie
        // fails at startup instead of on the first scrape.
        let args = vec![
            "run".to_owned(),
            "--transport".to_owned(),
            "streamable-http".to_owned(),
            "--host".to_owned(),
            host.clone(),
            "--port".to_owned(),
            port.to_string(),
            "--cookie".to_owned(),
            cookie,
            "--no-lazy-init".to_owned(),
        ];

        let mut process = ExternalMcpProcess::new(
            server_path,
            args,
            &host,
            port,
            LINKEDIN_STARTUP_TIMEOUT,
        );
        process.start().await?;
        let url = process.server_url().to_owned();
        self.process = Some(process);
        info!("LinkedIn MCP server started successfully");
        Ok(url)
    }

    /// Extract a LinkedIn username from a profile URL.
    ///
    /// `https://www.linkedin.com/in/jane-doe/` yields `jane-doe`.
    fn extract_username_from_url(input: &str) -> Option<String> {
        let parsed = url::Url::parse(input).ok()?;
        let mut segments = parsed.path_segments()?;
        if segments.next()? != "in" {
            return None;
        }
        let username = segments.next()?;
        if username.is_empty() {
            None
        } else {
            Some(username.to_owned())
        }
    }

    fn resolve_tool_call(&self, request: &PluginRequest) -> Result<(String, Value)> {
        let action = request.action.to_lowercase();

        match action.as_str() {
            "get_person_profile" => {
                let username = request.param_str("linkedin_username").ok_or_else(|| {
                    Error::Validation {
                        field: "linkedin_username".to_owned(),
                        reason: "Missing required parameter: linkedin_username".to_owned(),
                    }
                })?;
                Ok((
                    TOOL_PERSON_PROFILE.to_owned(),
                    json!({ "linkedin_username": username }),
                ))
            }
            "scrape_profile" | "get_profile" | "profile" => {
                let profile_input = request
                    .param_str("profile")
                    .or_else(|| request.param_str("url"))
                    .or_else(|| request.param_str("username"))
                    .map(ToOwned::to_owned);

                let username = match request.param_str("linkedin_username") {
                    Some(explicit) if !explicit.is_empty() => explicit.to_owned(),
                    _ => {
                        let input = profile_input.ok_or_else(|| Error::Validation {
                            field: "profile".to_owned(),
                            reason: "Profile URL or username is required".to_owned(),
                        })?;
                        Self::extract_username_from_url(&input).unwrap_or(input)
                    }
                };

                if username.is_empty() {
                    return Err(Error::Validation {
                        field: "linkedin_username".to_owned(),
                        reason: "linkedin_username parameter is required for profile scraping"
                            .to_owned(),
                    });
                }

                Ok((
                    TOOL_PERSON_PROFILE.to_owned(),
                    json!({ "linkedin_username": username }),
                ))
            }
            "scrape_company" | "get_company" | "company" => {
                let company_name = request.param_str("company_name").ok_or_else(|| {
                    Error::Validation {
                        field: "company_name".to_owned(),
                        reason: "company_name parameter is required for company scraping"
                            .to_owned(),
                    }
                })?;

                let mut args = json!({ "company_name": company_name });
                if request.param_bool("get_employees") {
                    args["get_employees"] = json!(true);
                }
                Ok((TOOL_COMPANY_PROFILE.to_owned(), args))
            }
            other => Err(Error::Validation {
                field: "action".to_owned(),
                reason: format!(
                    "Unknown action '{other}'. Provide 'action', 'url', 'linkedin_username', or 'company_name'"
                ),
            }),
        }
    }
}

#[async_trait]
impl Plugin for LinkedInExternalPlugin {
    async fn initialize(&mut self, config: Option<&Value>) -> Result<()> {
        info!("initializing LinkedIn external plugin");

        // Cookie from config, then environment-backed settings.
        self.cookie = config
            .and_then(|c| c.get("linkedin_cookie"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .or_else(|| self.settings.linkedin_cookie.clone());

        if self.cookie.is_none() {
            return Err(Error::Configuration {
                key: "linkedin_cookie".to_owned(),
                reason: "LinkedIn cookie is required. Set LINKEDIN_COOKIE environment variable."
                    .to_owned(),
            });
        }

        let server_url = self.setup_external_server(config).await?;

        let client = ExternalMcpClient::new(&server_url, LINKEDIN_TIMEOUT, LINKEDIN_MAX_RETRIES)?;

        // Establish the session eagerly so an invalid cookie surfaces now;
        // failure is tolerated and retried lazily on the first request.
        if let Err(e) = client.initialize_session().await {
            warn!(error = %e, "failed to initialize MCP session, will retry on first request");
        } else {
            let tools = client.list_tools().await.unwrap_or_default();
            for expected in [TOOL_PERSON_PROFILE, TOOL_COMPANY_PROFILE] {
                if !tools.iter().any(|tool| tool.name == expected) {
                    warn!(tool = expected, "expected tool not available in external server");
                }
            }
        }

        self.client = Some(client);
        self.initialized = true;
        info!("LinkedIn external plugin initialized successfully");
        Ok(())
    }

    async fn execute(&mut self, request: &PluginRequest) -> Result<PluginResponse> {
        if self.client.is_none() {
            return Ok(PluginResponse::error(
                &request.request_id,
                "Plugin not initialized. Please check configuration.",
            ));
        }

        info!(action = %request.action, "LinkedIn plugin received request");

        // A dead server is restarted before the call rather than failing it.
        let healthy = match &self.client {
            Some(client) => client.health_check().await,
            None => false,
        };
        if !healthy {
            warn!("LinkedIn MCP server health check failed, attempting restart");
            if let Some(process) = &mut self.process {
                process.restart().await?;
            }
            if let Some(client) = &self.client {
                client.close().await;
                client.initialize_session().await?;
            }
            info!("LinkedIn MCP server restarted and session initialized");
        }

        let (tool_name, tool_args) = match self.resolve_tool_call(request) {
            Ok(resolved) => resolved,
            Err(e) => {
                return Ok(PluginResponse::error(
                    &request.request_id,
                    format!("Validation error: {e}"),
                ))
            }
        };

        // Whitelist guard: only the two profile tools are ever exposed.
        if tool_name != TOOL_PERSON_PROFILE && tool_name != TOOL_COMPANY_PROFILE {
            return Ok(PluginResponse::error(
                &request.request_id,
                format!(
                    "Tool '{tool_name}' is not allowed. Available tools: [\"{TOOL_PERSON_PROFILE}\", \"{TOOL_COMPANY_PROFILE}\"]"
                ),
            ));
        }

        info!(tool = %tool_name, "calling external LinkedIn MCP tool");
        let client = self.client.as_ref().ok_or_else(|| Error::PluginExecution {
            name: "linkedin_external".to_owned(),
            action: request.action.clone(),
            reason: "MCP client missing after initialization".to_owned(),
        })?;

        let response = client.call_tool(&tool_name, tool_args).await?;

        if response.is_error {
            let error_text = response.text();
            error!(error = %error_text, "external MCP error");

            // An authentication failure is actionable for the operator.
            if error_text.contains("login") || error_text.contains("authentication") {
                return Ok(PluginResponse::error(
                    &request.request_id,
                    format!(
                        "External MCP error: {error_text}. The LinkedIn cookie may be expired; update the LINKEDIN_COOKIE environment variable with a fresh cookie."
                    ),
                ));
            }
            return Ok(PluginResponse::error(
                &request.request_id,
                format!("External MCP error: {error_text}"),
            ));
        }

        // Servers frequently return JSON encoded as text content.
        let text = response.text();
        let data: Value = if text.trim_start().starts_with('{') {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        debug!(data_len = data.to_string().len(), "LinkedIn plugin returning data");
        Ok(PluginResponse::success(&request.request_id, data)
            .with_metadata("external_tool", tool_name.clone())
            .with_metadata("action_performed", tool_name))
    }

    async fn shutdown(&mut self) {
        info!("shutting down LinkedIn external plugin");

        if let Some(client) = self.client.take() {
            client.close().await;
        }
        if let Some(mut process) = self.process.take() {
            process.stop().await;
        }
        self.initialized = false;

        info!("LinkedIn external plugin shutdown complete");
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "linkedin_external".to_owned(),
            version: "1.0.0".to_owned(),
            description: "LinkedIn profile and company scraper via external MCP server"
                .to_owned(),
            author: "Straylight Team".to_owned(),
            capabilities: vec![
                "scrape_profile".to_owned(),
                "get_profile".to_owned(),
                "profile".to_owned(),
                "scrape_company".to_owned(),
                "get_company".to_owned(),
                "company".to_owned(),
            ],
            // Required params depend on the action: linkedin_username or a
            // profile URL for profiles, company_name for companies.
            required_params: Default::default(),
            optional_params: [(
                "get_employees".to_owned(),
                "For company scraping - whether to fetch the employee list (boolean)".to_owned(),
            )]
            .into_iter()
            .collect(),
            examples: vec![PluginExample {
                query: "Get the LinkedIn profile for jane-doe".to_owned(),
                parameters: json!({"linkedin_username": "jane-doe"}),
            }],
        }
    }
}
