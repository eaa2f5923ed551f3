//! PDF resume parser plugin.
//!
//! Downloads a resume PDF, extracts its text, and produces structured
//! [`models::ResumeData`]. Two modes: direct heuristic extraction
//! ([`parser`]) and the preferred LLM-first mode ([`llm`]), used when direct
//! extraction leaves gaps and falling back to the direct result when the LLM
//! pass fails.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::providers::factory::ProviderFactory;

use super::{Plugin, PluginExample, PluginMetadata, PluginRequest, PluginResponse};

pub mod fetch;
pub mod llm;
pub mod models;
pub mod parser;

use llm::LlmParseOptions;
use models::ResumeData;

/// Plugin for parsing PDF resumes into structured data.
pub struct PdfResumePlugin {
    settings: Settings,
    factory: Arc<ProviderFactory>,
    default_provider: String,
    default_model: String,
    initialized: bool,
}

impl std::fmt::Debug for PdfResumePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfResumePlugin")
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl PdfResumePlugin {
    /// Create the plugin.
    pub fn new(settings: Settings, factory: Arc<ProviderFactory>) -> Self {
        let default_provider = "anthropic".to_owned();
        let default_model = settings.pdf_parsing_model(&default_provider);
        Self {
            settings,
            factory,
            default_provider,
            default_model,
            initialized: false,
        }
    }

    async fn parse(&self, request: &PluginRequest) -> Result<(ResumeData, usize, bool)> {
        let pdf_url = request.param_str("pdf_url").unwrap_or_default();
        let use_llm = request
            .parameters
            .get("use_llm_fallback")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let provider = request
            .param_str("llm_provider")
            .unwrap_or(&self.default_provider)
            .to_owned();
        let model = request
            .param_str("llm_model")
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| {
                if provider == self.default_provider {
                    self.default_model.clone()
                } else {
                    self.settings.pdf_parsing_model(&provider)
                }
            });

        let pdf_content = fetch::download_pdf(pdf_url).await?;
        let pdf_text = fetch::extract_text_from_pdf(&pdf_content)?;
        info!(text_length = pdf_text.len(), "text extraction complete");

        let direct = parser::parse_resume_text(&pdf_text);
        info!(
            education_entries = direct.education.len(),
            experience_entries = direct.experience.len(),
            skills_found = direct.skills.len(),
            "direct extraction results"
        );

        let needs_fallback = direct.needs_llm_fallback();
        if use_llm && needs_fallback {
            info!(provider = %provider, model = %model, "direct extraction incomplete, using LLM parsing");
            let api_key = match self.settings.llm_api_key(&provider) {
                Ok(api_key) => api_key,
                Err(e) => {
                    warn!(error = %e, "no API key for LLM parsing, keeping direct extraction");
                    return Ok((direct, pdf_text.len(), false));
                }
            };
            let options = LlmParseOptions {
                api_key,
                timeout: self.settings.timeout_for(&provider),
                provider,
                model,
            };
            // The LLM parses the raw text from scratch; its output is not
            // merged with the partial direct result. On failure the direct
            // result stands.
            match llm::parse_with_llm(&pdf_text, &self.factory, &options).await {
                Ok(parsed) => return Ok((parsed, pdf_text.len(), true)),
                Err(e) => {
                    warn!(error = %e, "LLM parsing failed, keeping direct extraction");
                    return Ok((direct, pdf_text.len(), false));
                }
            }
        } else if needs_fallback {
            warn!("direct extraction incomplete and LLM fallback disabled");
        }

        Ok((direct, pdf_text.len(), false))
    }
}

#[async_trait]
impl Plugin for PdfResumePlugin {
    async fn initialize(&mut self, config: Option<&Value>) -> Result<()> {
        if let Some(config) = config {
            if let Some(provider) = config.get("llm_provider").and_then(Value::as_str) {
                self.default_provider = provider.to_owned();
                self.default_model = self.settings.pdf_parsing_model(provider);
            }
            if let Some(model) = config.get("llm_model").and_then(Value::as_str) {
                self.default_model = model.to_owned();
            }
        }
        self.initialized = true;
        info!(
            llm_provider = %self.default_provider,
            llm_model = %self.default_model,
            "PDF resume parser plugin initialized"
        );
        Ok(())
    }

    async fn execute(&mut self, request: &PluginRequest) -> Result<PluginResponse> {
        if request.param_str("pdf_url").is_none() {
            return Ok(PluginResponse::error(
                &request.request_id,
                "Missing required parameter: pdf_url",
            ));
        }

        match self.parse(request).await {
            Ok((resume, text_length, used_llm)) => {
                let parsed = serde_json::to_value(&resume).unwrap_or(Value::Null);
                Ok(PluginResponse::success(
                    &request.request_id,
                    json!({
                        "parsed_resume": parsed,
                        "text_length": text_length,
                        "source_url": request.param_str("pdf_url"),
                    }),
                )
                .with_metadata("plugin", "pdf_resume_parser")
                .with_metadata("used_llm_fallback", used_llm))
            }
            Err(e) => Ok(PluginResponse::error(
                &request.request_id,
                format!("PDF resume parsing failed: {e}"),
            )),
        }
    }

    async fn shutdown(&mut self) {
        info!("shutting down PDF resume parser plugin");
        self.initialized = false;
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "pdf_resume_parser".to_owned(),
            version: "1.0.0".to_owned(),
            description: "Extracts text and structured data from PDF resumes".to_owned(),
            author: "Straylight Team".to_owned(),
            capabilities: vec![
                "pdf_parsing".to_owned(),
                "resume_parsing".to_owned(),
                "document_extraction".to_owned(),
            ],
            required_params: [(
                "pdf_url".to_owned(),
                "URL to the PDF resume to parse".to_owned(),
            )]
            .into_iter()
            .collect(),
            optional_params: [
                (
                    "use_llm_fallback".to_owned(),
                    "Whether to use LLM parsing when direct extraction is incomplete (boolean, default: true)"
                        .to_owned(),
                ),
                (
                    "llm_provider".to_owned(),
                    "LLM provider to use for parsing (string, default: 'anthropic')".to_owned(),
                ),
                (
                    "llm_model".to_owned(),
                    "LLM model to use for parsing (string, defaults to the cheap parsing model)"
                        .to_owned(),
                ),
            ]
            .into_iter()
            .collect(),
            examples: vec![
                PluginExample {
                    query: "Parse resume from URL".to_owned(),
                    parameters: json!({"pdf_url": "https://example.com/resume.pdf"}),
                },
                PluginExample {
                    query: "Parse resume without LLM fallback".to_owned(),
                    parameters: json!({
                        "pdf_url": "https://example.com/resume.pdf",
                        "use_llm_fallback": false
                    }),
                },
            ],
        }
    }
}
