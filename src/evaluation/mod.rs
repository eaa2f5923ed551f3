//! The evaluation orchestrator.
//!
//! One [`EvaluationService::evaluate`] call runs the whole pipeline:
//! enrichment (optional, failure-tolerant), prompt assembly, the provider
//! call, score extraction, and response assembly with the diagnostic
//! appendices.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::Result;
use crate::plugins::PluginManager;
use crate::prompts::multi_axis::{build_multi_axis_prompt, get_multi_axis_template};
use crate::prompts::{build_prompt, PromptTemplate, PromptVariables};
use crate::providers::factory::ProviderFactory;
use crate::providers::{ChatMessage, CompletionRequest};
use crate::scoring::{extract_multi_axis_scores, extract_score};

pub mod enrichment;

pub use crate::scoring::AxisScore;

/// Evaluations prefer consistency over creativity.
const EVALUATION_TEMPERATURE: f32 = 0.2;
/// Template forced whenever multi-axis mode is enabled.
const MULTI_AXIS_TEMPLATE_ID: &str = "multi_axis_spar";
const DEFAULT_MULTI_AXIS_CRITERIA: &str = "Evaluate the candidate for the SPAR research program.";
const DEFAULT_MULTI_AXIS_INSTRUCTIONS: &str =
    "Return a score from 1-5 for each of the evaluation axes.";

/// Parameters for one applicant evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// API key for the selected provider.
    pub api_key: String,
    /// Provider to use (`openai` or `anthropic`).
    pub provider: String,
    /// Model name to use.
    pub model: String,
    /// Applicant data to evaluate.
    pub applicant_data: String,
    /// Evaluation criteria.
    pub criteria_string: String,
    /// Template id; ignored when multi-axis is enabled (SPAR is forced).
    #[serde(default)]
    pub template_id: Option<String>,
    /// Custom single-axis template overriding the shipped ones.
    #[serde(default)]
    pub custom_template: Option<PromptTemplate>,
    /// Ranking keyword override for single-axis mode.
    #[serde(default)]
    pub ranking_keyword: Option<String>,
    /// Extra instructions appended to the system message.
    #[serde(default)]
    pub additional_instructions: Option<String>,
    /// Whether to score every axis of the multi-axis template.
    #[serde(default)]
    pub use_multi_axis: bool,
    /// Whether to run plugin enrichment.
    #[serde(default)]
    pub use_plugin: bool,
    /// Profile or document URL to enrich from.
    #[serde(default)]
    pub source_url: Option<String>,
    /// PDF resume URL to enrich from.
    #[serde(default)]
    pub pdf_url: Option<String>,
    /// Override for the provider's system-message normalization.
    #[serde(default)]
    pub normalize_system: Option<bool>,
}

/// Result of one applicant evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Full LLM output, with diagnostic appendices.
    pub result: String,
    /// First-axis score, kept for single-score consumers.
    pub score: Option<i32>,
    /// Per-axis scores in template order (multi-axis mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<AxisScore>>,
    /// Provider that served the evaluation.
    pub provider: String,
    /// Model that served the evaluation.
    pub model: String,
}

/// Orchestrates enrichment, prompt assembly, the provider call and score
/// extraction. Owns only per-request state.
pub struct EvaluationService {
    settings: Settings,
    factory: Arc<ProviderFactory>,
    plugin_manager: Arc<PluginManager>,
}

impl std::fmt::Debug for EvaluationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationService").finish()
    }
}

impl EvaluationService {
    /// Create the service.
    pub fn new(
        settings: Settings,
        factory: Arc<ProviderFactory>,
        plugin_manager: Arc<PluginManager>,
    ) -> Self {
        Self {
            settings,
            factory,
            plugin_manager,
        }
    }

    /// Evaluate one applicant.
    ///
    /// # Errors
    ///
    /// Fails on an unknown provider (validation error) or a provider-call
    /// failure. Enrichment failures never fail the evaluation; they are
    /// recorded in the enrichment log appended to the result.
    pub async fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse> {
        info!(
            provider = %request.provider,
            model = %request.model,
            multi_axis = request.use_multi_axis,
            "evaluation request received"
        );

        let mut enrichment_log: Vec<String> = Vec::new();
        let enrichment = if request.use_plugin && request.source_url.is_some() {
            enrichment::run_enrichment(
                &self.plugin_manager,
                request.source_url.as_deref(),
                request.pdf_url.as_deref(),
                &request.provider,
                &mut enrichment_log,
            )
            .await
        } else {
            enrichment::EnrichmentOutcome::default()
        };

        let mut applicant_data = request.applicant_data.clone();
        if let Some(data) = &enrichment.data {
            let enrichment_text = enrichment::format_enrichment_data(data);
            enrichment_log.push("Formatted enrichment data for prompt".to_owned());
            applicant_data =
                format!("{applicant_data}\n\n### CANDIDATE ENRICHMENT DATA:\n{enrichment_text}");
            enrichment_log.push("Added enrichment data to applicant data".to_owned());
        }

        let mut criteria_string = request.criteria_string.replace("<br>", "\n");
        let mut ranking_keyword = request.ranking_keyword.clone();
        let mut additional_instructions = request.additional_instructions.clone();

        if request.use_multi_axis {
            if criteria_string.trim().is_empty() {
                criteria_string = DEFAULT_MULTI_AXIS_CRITERIA.to_owned();
            }
            ranking_keyword = None;
            if additional_instructions
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .is_empty()
            {
                additional_instructions = Some(DEFAULT_MULTI_AXIS_INSTRUCTIONS.to_owned());
            }
        }

        let variables = PromptVariables {
            criteria_string,
            ranking_keyword,
            additional_instructions,
        };

        let (messages, axis_keywords, single_keyword) =
            self.build_messages(&request, &applicant_data, &variables)?;

        let provider = self
            .factory
            .get(&request.provider, self.settings.timeout_for(&request.provider))?;
        let max_tokens = self.settings.max_tokens_for(&request.provider);
        debug!(provider = provider.name(), max_tokens, "calling provider for evaluation");

        let mut completion_request =
            CompletionRequest::new(&request.model, messages, &request.api_key);
        completion_request.temperature = Some(EVALUATION_TEMPERATURE);
        completion_request.max_tokens = Some(max_tokens);
        completion_request.normalize_system = request.normalize_system;

        let completion = provider.complete(completion_request).await?;
        let mut result = completion.content;

        let mut score = None;
        let mut scores = None;

        if request.use_multi_axis {
            let extracted = extract_multi_axis_scores(&result, &axis_keywords);
            info!(
                extracted = extracted.iter().filter(|s| s.score.is_some()).count(),
                total = extracted.len(),
                "extracted multi-axis scores"
            );

            score = extracted.first().and_then(|s| s.score);
            let extracted_count = extracted.iter().filter(|s| s.score.is_some()).count();
            if extracted_count == 0 {
                result.push_str(
                    "\n\n[WARNING] No multi-axis scores could be extracted from the LLM response. \
                     Please check the prompt format and extraction logic.",
                );
            }

            let listing = extracted
                .iter()
                .map(|axis| match axis.score {
                    Some(value) => format!("{}: {value}", axis.name),
                    None => format!("{}: Not found", axis.name),
                })
                .collect::<Vec<_>>()
                .join("\n");
            result.push_str(&format!(
                "\n\n[MULTI_AXIS_SCORES]\n{listing}\n[END_MULTI_AXIS_SCORES]"
            ));

            scores = Some(extracted);
        } else {
            score = extract_score(&result, &single_keyword);
            info!(?score, "extracted score");
        }

        if !enrichment_log.is_empty() {
            result.push_str(&format!(
                "\n\n[ENRICHMENT LOG]\n{}\n[END ENRICHMENT LOG]",
                enrichment_log.join("\n")
            ));
        }
        if let Some(linkedin_json) = &enrichment.linkedin_json {
            result.push_str(&format!(
                "\n\n[LINKEDIN_DATA]\n{linkedin_json}\n[END_LINKEDIN_DATA]"
            ));
        }
        if let Some(pdf_json) = &enrichment.pdf_json {
            result.push_str(&format!(
                "\n\n[PDF_RESUME_DATA]\n{pdf_json}\n[END_PDF_RESUME_DATA]"
            ));
        }

        Ok(EvaluationResponse {
            result,
            score,
            scores,
            provider: request.provider,
            model: request.model,
        })
    }

    /// Assemble the prompt messages plus the keyword(s) extraction will use.
    #[allow(clippy::type_complexity)]
    fn build_messages(
        &self,
        request: &EvaluationRequest,
        applicant_data: &str,
        variables: &PromptVariables,
    ) -> Result<(Vec<ChatMessage>, Vec<(String, String)>, String)> {
        if request.use_multi_axis {
            let template = get_multi_axis_template(MULTI_AXIS_TEMPLATE_ID);
            template.validate()?;
            let messages = build_multi_axis_prompt(applicant_data, &template, variables);
            let keywords = template.axis_ranking_keywords();
            debug!(axes = keywords.len(), "built multi-axis prompt");
            return Ok((messages, keywords, String::new()));
        }

        // Single-axis mode: a custom template wins; otherwise collapse the
        // SPAR template to its first axis.
        let template = match &request.custom_template {
            Some(custom) => custom.clone(),
            None => get_multi_axis_template(MULTI_AXIS_TEMPLATE_ID).to_prompt_template()?,
        };
        let messages = build_prompt(applicant_data, &template, variables);
        let keyword = crate::prompts::ranking_keyword(&template, variables);
        debug!(keyword = %keyword, "built single-axis prompt");
        Ok((messages, Vec::new(), keyword))
    }
}
