//! Multi-axis evaluation templates and the multi-axis prompt builder.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::providers::ChatMessage;

use super::{PromptTemplate, PromptVariables};

/// Template for one evaluation axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisTemplate {
    /// Human-readable axis name.
    pub name: String,
    /// What this axis evaluates.
    pub description: String,
    /// All-caps token used to locate this axis's score in the LLM reply.
    pub ranking_keyword: String,
    /// Prompt section with a `{ranking_keyword}` placeholder.
    pub prompt_section: String,
}

/// Template for a multi-dimensional evaluation across several axes.
///
/// Axis order is meaningful: the first axis is the single-axis projection
/// and score lists are emitted in template order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiAxisTemplate {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What this template is for.
    pub description: String,
    /// Introduction with a `{criteria_string}` placeholder.
    pub system_intro: String,
    /// Conclusion with an `{additional_instructions}` placeholder.
    pub system_outro: String,
    /// Ordered evaluation axes.
    pub axes: Vec<AxisTemplate>,
}

impl MultiAxisTemplate {
    /// Check the template invariants: at least one axis, unique ranking
    /// keywords.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when an invariant is violated.
    pub fn validate(&self) -> Result<()> {
        if self.axes.is_empty() {
            return Err(Error::Validation {
                field: "axes".to_owned(),
                reason: "multi-axis template must have at least one axis".to_owned(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for axis in &self.axes {
            if !seen.insert(axis.ranking_keyword.as_str()) {
                return Err(Error::Validation {
                    field: "axes".to_owned(),
                    reason: format!("duplicate ranking keyword '{}'", axis.ranking_keyword),
                });
            }
        }
        Ok(())
    }

    /// Collapse to a single-axis [`PromptTemplate`] built from the first
    /// axis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the template has no axes.
    pub fn to_prompt_template(&self) -> Result<PromptTemplate> {
        let first = self.axes.first().ok_or_else(|| Error::Validation {
            field: "axes".to_owned(),
            reason: "multi-axis template must have at least one axis".to_owned(),
        })?;

        Ok(PromptTemplate {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            system_message: format!(
                "{}\n\n{}\n\n{}",
                self.system_intro, first.prompt_section, self.system_outro
            ),
            ranking_keyword: first.ranking_keyword.clone(),
        })
    }

    /// Axis-name → ranking-keyword pairs in template order.
    pub fn axis_ranking_keywords(&self) -> Vec<(String, String)> {
        self.axes
            .iter()
            .map(|axis| (axis.name.clone(), axis.ranking_keyword.clone()))
            .collect()
    }
}

/// Build the multi-axis prompt.
///
/// The system message (intro with criteria substituted, each axis section
/// with its ranking keyword substituted, outro with additional instructions
/// substituted) comes FIRST, followed by the applicant text as the user
/// message. The ordering is load-bearing: the Anthropic adapter hoists the
/// leading system message into its top-level `system` field.
pub fn build_multi_axis_prompt(
    applicant_data: &str,
    template: &MultiAxisTemplate,
    variables: &PromptVariables,
) -> Vec<ChatMessage> {
    let mut system_message = template
        .system_intro
        .replace("{criteria_string}", &variables.criteria_string);

    for axis in &template.axes {
        let section = axis
            .prompt_section
            .replace("{ranking_keyword}", &axis.ranking_keyword);
        system_message.push_str("\n\n");
        system_message.push_str(&section);
    }

    system_message.push_str("\n\n");
    system_message.push_str(&template.system_outro);

    system_message = match variables
        .additional_instructions
        .as_deref()
        .map(str::trim)
        .filter(|instructions| !instructions.is_empty())
    {
        Some(instructions) => system_message
            .replace("{additional_instructions}", &format!("\n\n{instructions}")),
        None => system_message.replace("{additional_instructions}", ""),
    };

    vec![
        ChatMessage::system(system_message),
        ChatMessage::user(applicant_data),
    ]
}

/// Look up a multi-axis template by id, falling back to the shipped SPAR
/// template.
pub fn get_multi_axis_template(template_id: &str) -> MultiAxisTemplate {
    let spar = super::spar::spar_template();
    if template_id != spar.id {
        tracing::debug!(template_id, "unknown multi-axis template id, using SPAR");
    }
    spar
}
