//! Semantic routing: pick a plugin for a natural-language query by asking
//! an LLM, plan multi-step executions, and run them.
//!
//! The router consumes plugin metadata from the manager, asks the
//! configured LLM for a strict-JSON decision, and normalizes the reply
//! (code fences stripped, key aliases mapped) into a [`RoutingDecision`].
//! Multi-step plans are validated before any step executes: every declared
//! dependency must point at a strictly earlier step.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::plugins::{PluginManager, PluginMetadata, PluginRequest, PluginResponse};
use crate::providers::factory::ProviderFactory;
use crate::providers::{ChatMessage, CompletionRequest, LlmProvider};

pub mod reflection;

const ROUTING_SYSTEM_PROMPT: &str = r#"You are a semantic router that analyzes user queries and routes them to appropriate plugins.

Your task is to:
1. Understand the user's intent from their query
2. Select the most appropriate plugin from available options
3. Extract relevant parameters from the query
4. Provide a confidence score (0-1) for your routing decision

You MUST respond with ONLY a JSON object (no additional text, no markdown formatting).

Example response format:
{
    "plugin": "linkedin_external",
    "confidence": 0.95,
    "reasoning": "User is asking for LinkedIn profile information",
    "parameters": {
        "username": "johndoe"
    }
}

Important:
- Response must be valid JSON only
- Use "plugin" not "plugin_name"
- Use "parameters" not "extracted_params"
- Do not wrap in markdown code blocks
- Do not include any text before or after the JSON"#;

const PLANNING_SYSTEM_PROMPT: &str = r#"You are a task planner that creates multi-step execution plans for complex queries.

Your task is to:
1. Analyze if the query requires multiple steps
2. Break down complex tasks into individual plugin calls
3. Identify dependencies between steps
4. Create an efficient execution plan

You MUST respond with ONLY a JSON object of the form:
{
    "steps": [
        {"plugin_name": "...", "parameters": {...}, "depends_on": [0]}
    ],
    "reasoning": "..."
}

Consider:
- Some steps may depend on outputs from previous steps
- Steps should be as atomic as possible
- Use available plugin capabilities effectively
- Provide clear reasoning for your plan"#;

const COMPLEXITY_SYSTEM_PROMPT: &str = r#"Analyze if this query requires multiple steps or can be handled by a single plugin.

Consider it multi-step if it:
- Requires data from one plugin to feed into another
- Asks for multiple distinct operations
- Needs sequential processing
- Combines results from different sources

Respond with:
- is_complex: true/false
- reasoning: brief explanation"#;

/// A routing decision made by the semantic router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Name of the selected plugin.
    pub plugin_name: String,
    /// Confidence score in [0, 1].
    pub confidence: f64,
    /// Explanation for the routing decision.
    pub reasoning: String,
    /// Parameters extracted from the query.
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// One step in a multi-step execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Plugin to invoke.
    pub plugin_name: String,
    /// Parameters for the invocation.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Indices of steps this one depends on; all must be strictly earlier.
    #[serde(default)]
    pub depends_on: Vec<usize>,
}

/// A multi-step execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiStepPlan {
    /// Ordered steps.
    pub steps: Vec<PlanStep>,
    /// Overall plan reasoning.
    #[serde(default)]
    pub reasoning: String,
}

/// Semantic router for plugin selection and orchestration.
pub struct SemanticRouter {
    plugin_manager: Arc<PluginManager>,
    provider: Arc<dyn LlmProvider>,
    api_key: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for SemanticRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticRouter")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

impl SemanticRouter {
    /// Create a router over an explicit provider handle.
    pub fn new(
        plugin_manager: Arc<PluginManager>,
        provider: Arc<dyn LlmProvider>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            plugin_manager,
            provider,
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
        }
    }

    /// Create a router using the default provider from settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the default provider has no API
    /// key configured.
    pub fn from_settings(
        settings: &Settings,
        factory: &ProviderFactory,
        plugin_manager: Arc<PluginManager>,
    ) -> Result<Self> {
        let provider_name = settings.llm_provider.clone();
        let provider = factory.get(&provider_name, settings.timeout_for(&provider_name))?;
        let api_key = settings.llm_api_key(&provider_name)?;
        let model = settings.llm_model(&provider_name);
        Ok(Self::new(plugin_manager, provider, api_key, model))
    }

    /// Ask the configured LLM for a completion. Used by the router's own
    /// prompts and by the reflection loop.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn complete_text(&self, system: &str, user: &str) -> Result<String> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let mut request = CompletionRequest::new(&self.model, messages, &self.api_key);
        request.temperature = Some(self.temperature);
        let completion = self.provider.complete(request).await?;
        Ok(completion.content)
    }

    fn format_plugins_info(
        plugins: &std::collections::BTreeMap<String, PluginMetadata>,
    ) -> String {
        let mut formatted = Vec::new();
        for (name, metadata) in plugins {
            let mut info = format!("Plugin: {name}\n");
            info.push_str(&format!("  Description: {}\n", metadata.description));
            info.push_str(&format!(
                "  Capabilities: {}\n",
                metadata.capabilities.join(", ")
            ));
            if !metadata.required_params.is_empty() {
                info.push_str(&format!(
                    "  Required params: {:?}\n",
                    metadata.required_params
                ));
            }
            if !metadata.optional_params.is_empty() {
                info.push_str(&format!(
                    "  Optional params: {:?}\n",
                    metadata.optional_params
                ));
            }
            if !metadata.examples.is_empty() {
                info.push_str("  Examples:\n");
                // Two examples keep the prompt inside sane token bounds.
                for example in metadata.examples.iter().take(2) {
                    info.push_str(&format!("    - {}\n", example.query));
                }
            }
            formatted.push(info);
        }
        formatted.join("\n")
    }

    /// Route a query to the most appropriate plugin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPluginsAvailable`] with an empty registry and
    /// [`Error::RoutingDecision`] when the LLM reply cannot be turned into a
    /// decision naming a known plugin.
    pub async fn route(&self, query: &str) -> Result<RoutingDecision> {
        info!(query, "routing query");

        let plugins = self.plugin_manager.all_plugin_metadata().await;
        if plugins.is_empty() {
            return Err(Error::NoPluginsAvailable);
        }

        let plugins_info = Self::format_plugins_info(&plugins);
        let user = format!("{query}\n\nAvailable plugins:\n{plugins_info}");

        let content = self
            .complete_text(ROUTING_SYSTEM_PROMPT, &user)
            .await
            .map_err(|e| Error::RoutingDecision {
                query: query.to_owned(),
                reason: e.to_string(),
            })?;
        debug!(content = %content, "LLM raw routing response");

        let data = parse_json_reply(&content).map_err(|reason| Error::RoutingDecision {
            query: query.to_owned(),
            reason,
        })?;

        let plugin_name = data
            .get("plugin")
            .or_else(|| data.get("plugin_name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        if !plugins.contains_key(&plugin_name) {
            return Err(Error::RoutingDecision {
                query: query.to_owned(),
                reason: format!("LLM selected unknown plugin '{plugin_name}'"),
            });
        }

        let mut decision = RoutingDecision {
            plugin_name,
            confidence: data
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            reasoning: data
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or("Selected based on query analysis")
                .to_owned(),
            parameters: data
                .get("parameters")
                .or_else(|| data.get("extracted_params"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        };

        decision = Self::infer_plugin_action(query, decision);

        info!(
            plugin = %decision.plugin_name,
            confidence = decision.confidence,
            "routing decision made"
        );
        Ok(decision)
    }

    /// Infer the concrete action for plugins that need one.
    ///
    /// The profile plugin distinguishes person and company scrapes; the
    /// query decides which, and loosely-named username parameters are
    /// normalized to `linkedin_username`.
    fn infer_plugin_action(query: &str, mut decision: RoutingDecision) -> RoutingDecision {
        if decision.plugin_name != "linkedin_external" {
            return decision;
        }

        let query_lower = query.to_lowercase();
        let is_company = ["company", "companies", "organization", "firm"]
            .iter()
            .any(|word| query_lower.contains(word));

        if is_company {
            decision
                .parameters
                .insert("action".to_owned(), json!("get_company"));
            if !decision.parameters.contains_key("company_name") {
                if let Some(quoted) = extract_quoted(query) {
                    decision
                        .parameters
                        .insert("company_name".to_owned(), json!(quoted));
                }
            }
        } else {
            decision
                .parameters
                .insert("action".to_owned(), json!("get_profile"));
            if !decision.parameters.contains_key("linkedin_username") {
                let alias = decision
                    .parameters
                    .get("username")
                    .or_else(|| decision.parameters.get("profile"))
                    .cloned();
                if let Some(alias) = alias {
                    decision
                        .parameters
                        .insert("linkedin_username".to_owned(), alias);
                }
            }
        }

        debug!(params = ?decision.parameters, "inferred action for profile plugin");
        decision
    }

    /// Execute a single plugin based on a routing decision (computed when
    /// not supplied).
    ///
    /// # Errors
    ///
    /// Propagates routing and plugin-execution failures.
    pub async fn execute_single(
        &self,
        query: &str,
        routing_decision: Option<RoutingDecision>,
    ) -> Result<PluginResponse> {
        let mut decision = match routing_decision {
            Some(decision) => decision,
            None => self.route(query).await?,
        };

        // The action travels in parameters; remove it so the plugin does not
        // see it twice.
        let action = match decision.parameters.remove("action") {
            Some(Value::String(action)) => action,
            _ => decision.plugin_name.clone(),
        };

        let mut request = PluginRequest::new(action);
        request.parameters = decision.parameters.clone();

        self.plugin_manager
            .execute_plugin(&decision.plugin_name, &request)
            .await
    }

    /// Ask the LLM for a multi-step execution plan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultiStepExecution`] when no plan can be parsed.
    pub async fn plan_multi_step(&self, query: &str) -> Result<MultiStepPlan> {
        info!(query, "planning multi-step execution");

        let plugins = self.plugin_manager.all_plugin_metadata().await;
        let plugins_info = Self::format_plugins_info(&plugins);
        let user = format!("{query}\n\nAvailable plugins:\n{plugins_info}");

        let content = self
            .complete_text(PLANNING_SYSTEM_PROMPT, &user)
            .await
            .map_err(|e| Error::MultiStepExecution {
                step: 0,
                total_steps: 0,
                reason: format!("Failed to create execution plan: {e}"),
            })?;

        let data = parse_json_reply(&content).map_err(|reason| Error::MultiStepExecution {
            step: 0,
            total_steps: 0,
            reason: format!("Failed to parse execution plan: {reason}"),
        })?;

        serde_json::from_value(data).map_err(|e| Error::MultiStepExecution {
            step: 0,
            total_steps: 0,
            reason: format!("Execution plan did not match the expected shape: {e}"),
        })
    }

    /// Execute a multi-step plan sequentially.
    ///
    /// All dependency declarations are validated before any step runs: a
    /// step may only depend on strictly earlier steps. Each request carries
    /// the accumulated previous responses in its context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultiStepExecution`] for invalid dependencies and
    /// propagates plugin failures.
    pub async fn execute_multi_step(
        &self,
        query: &str,
        plan: Option<MultiStepPlan>,
    ) -> Result<Vec<PluginResponse>> {
        let plan = match plan {
            Some(plan) => plan,
            None => self.plan_multi_step(query).await?,
        };
        let total_steps = plan.steps.len();

        // Reject the whole plan before executing anything.
        for (index, step) in plan.steps.iter().enumerate() {
            for dep in &step.depends_on {
                if *dep >= index {
                    return Err(Error::MultiStepExecution {
                        step: index.saturating_add(1),
                        total_steps,
                        reason: format!(
                            "Invalid dependency: step {index} depends on unexecuted step {dep}"
                        ),
                    });
                }
            }
        }

        let mut responses: Vec<PluginResponse> = Vec::with_capacity(total_steps);

        for (index, step) in plan.steps.into_iter().enumerate() {
            let mut request = PluginRequest::new(step.plugin_name.clone());
            request.parameters = step.parameters;
            request.context.insert(
                "previous_results".to_owned(),
                serde_json::to_value(&responses).unwrap_or(Value::Null),
            );
            request
                .context
                .insert("step_index".to_owned(), json!(index));
            request
                .context
                .insert("total_steps".to_owned(), json!(total_steps));

            let response = self
                .plugin_manager
                .execute_plugin(&step.plugin_name, &request)
                .await?;
            responses.push(response);
        }

        Ok(responses)
    }

    /// Decide whether a query needs multi-step execution.
    ///
    /// Defaults to simple execution when the LLM call fails.
    pub async fn analyze_complexity(&self, query: &str) -> (bool, String) {
        match self.complete_text(COMPLEXITY_SYSTEM_PROMPT, query).await {
            Ok(content) => {
                let lowered = content.to_lowercase();
                let first_line = lowered.lines().next().unwrap_or_default();
                let is_complex =
                    lowered.contains("is_complex: true") || first_line.contains("true");
                (is_complex, content.trim().to_owned())
            }
            Err(e) => {
                warn!(error = %e, "failed to analyze complexity");
                (
                    false,
                    "Defaulting to simple execution due to analysis error".to_owned(),
                )
            }
        }
    }

    /// Process a query end-to-end: complexity analysis, then single routing
    /// or multi-step planning and execution.
    ///
    /// # Errors
    ///
    /// Propagates routing, planning and plugin failures.
    pub async fn process_query(&self, query: &str) -> Result<Value> {
        info!(query, "processing query");

        let (is_complex, reasoning) = self.analyze_complexity(query).await;

        if is_complex {
            let plan = self.plan_multi_step(query).await?;
            let responses = self.execute_multi_step(query, Some(plan.clone())).await?;
            Ok(json!({
                "type": "multi_step",
                "plan": plan,
                "responses": responses,
                "reasoning": reasoning,
            }))
        } else {
            let routing = self.route(query).await?;
            let response = self.execute_single(query, Some(routing.clone())).await?;
            Ok(json!({
                "type": "single_step",
                "routing": routing,
                "response": response,
                "reasoning": reasoning,
            }))
        }
    }
}

/// Strip markdown code fences from an LLM reply and parse it as JSON.
///
/// # Errors
///
/// Returns a human-readable reason string on parse failure.
pub fn parse_json_reply(content: &str) -> std::result::Result<Value, String> {
    let stripped = strip_code_fences(content);
    serde_json::from_str(&stripped)
        .map_err(|e| format!("Failed to parse JSON from LLM response: {e}"))
}

/// Remove a ```json ... ``` (or bare ```) wrapper when present.
pub fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start.saturating_add(7)..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_owned();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start.saturating_add(3)..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_owned();
        }
    }

    trimmed.to_owned()
}

fn extract_quoted(query: &str) -> Option<String> {
    let start = query.find('"')?;
    let rest = &query[start.saturating_add(1)..];
    let end = rest.find('"')?;
    Some(rest[..end].to_owned())
}
