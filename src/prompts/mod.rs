//! Prompt template system for applicant evaluations.
//!
//! Two representations: single-axis [`PromptTemplate`]s and multi-axis
//! templates in [`multi_axis`]. Placeholders (`{criteria_string}`,
//! `{ranking_keyword}`, `{additional_instructions}`) are substituted
//! verbatim by the builders; an absent additional-instructions value erases
//! its placeholder.

use serde::{Deserialize, Serialize};

use crate::providers::ChatMessage;

pub mod multi_axis;
pub mod spar;

/// A single-axis prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What this template is for.
    pub description: String,
    /// System message with `{criteria_string}`, `{ranking_keyword}` and
    /// `{additional_instructions}` placeholders.
    pub system_message: String,
    /// Default ranking keyword when the caller provides none.
    pub ranking_keyword: String,
}

/// Variables substituted into prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptVariables {
    /// Evaluation criteria text.
    pub criteria_string: String,
    /// Ranking keyword override.
    pub ranking_keyword: Option<String>,
    /// Extra instructions appended to the system message.
    pub additional_instructions: Option<String>,
}

/// The default single-axis template, proven on academic/course applications.
pub fn academic_template() -> PromptTemplate {
    PromptTemplate {
        id: "academic".to_owned(),
        name: "Academic Evaluation".to_owned(),
        description: "Proven template for academic/course applications".to_owned(),
        system_message: "Evaluate the application above, based on the following rubric: {criteria_string}\n\n\
            You should ignore general statements or facts about the world, and focus on what the applicant themselves has achieved. You do not need to structure your assessment similar to the answers the user has given.\n\n\
            IMPORTANT RATING CONSTRAINTS:\n\
            - Your rating MUST be an integer (whole number only)\n\
            - Your rating MUST be between 1 and 5 (inclusive)\n\
            - DO NOT use ratings above 5 or below 1\n\
            - If the rubric mentions different scale values, convert them to the 1-5 scale\n\n\
            First explain your reasoning thinking step by step. Then output your final answer by stating '{ranking_keyword} = ' and then the relevant integer between 1 and 5.{additional_instructions}"
            .to_owned(),
        ranking_keyword: "FINAL_RANKING".to_owned(),
    }
}

/// Look up a single-axis template by id, falling back to the default.
pub fn get_template(template_id: &str) -> PromptTemplate {
    let academic = academic_template();
    if template_id != academic.id {
        tracing::debug!(template_id, "unknown template id, using the default");
    }
    academic
}

/// Substitute `variables` into a system message.
fn fill_system_message(system_message: &str, variables: &PromptVariables, default_keyword: &str) -> String {
    let keyword = variables
        .ranking_keyword
        .as_deref()
        .filter(|k| !k.is_empty())
        .unwrap_or(default_keyword);

    let mut filled = system_message
        .replace("{criteria_string}", &variables.criteria_string)
        .replace("{ranking_keyword}", keyword);

    filled = match variables
        .additional_instructions
        .as_deref()
        .map(str::trim)
        .filter(|instructions| !instructions.is_empty())
    {
        Some(instructions) => {
            filled.replace("{additional_instructions}", &format!("\n\n{instructions}"))
        }
        None => filled.replace("{additional_instructions}", ""),
    };

    filled
}

/// Build the two-message single-axis prompt: the applicant text as the user
/// message followed by the filled template as the system message.
pub fn build_prompt(
    applicant_data: &str,
    template: &PromptTemplate,
    variables: &PromptVariables,
) -> Vec<ChatMessage> {
    let system_message = fill_system_message(
        &template.system_message,
        variables,
        &template.ranking_keyword,
    );

    vec![
        ChatMessage::user(applicant_data),
        ChatMessage::system(system_message),
    ]
}

/// The ranking keyword that score extraction should look for.
pub fn ranking_keyword(template: &PromptTemplate, variables: &PromptVariables) -> String {
    variables
        .ranking_keyword
        .clone()
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| template.ranking_keyword.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Role;

    #[test]
    fn test_build_prompt_substitutes_all_placeholders() {
        let template = academic_template();
        let variables = PromptVariables {
            criteria_string: "Strong research record".to_owned(),
            ranking_keyword: None,
            additional_instructions: Some("Be strict.".to_owned()),
        };

        let messages = build_prompt("applicant text", &template, &variables);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "applicant text");
        assert_eq!(messages[1].role, Role::System);
        assert!(messages[1].content.contains("Strong research record"));
        assert!(messages[1].content.contains("FINAL_RANKING = "));
        assert!(messages[1].content.ends_with("Be strict."));
        assert!(!messages[1].content.contains('{'));
    }

    #[test]
    fn test_missing_additional_instructions_erased() {
        let template = academic_template();
        let variables = PromptVariables {
            criteria_string: "c".to_owned(),
            ..PromptVariables::default()
        };
        let messages = build_prompt("a", &template, &variables);
        assert!(!messages[1].content.contains("{additional_instructions}"));
    }

    #[test]
    fn test_keyword_override() {
        let template = academic_template();
        let variables = PromptVariables {
            criteria_string: "c".to_owned(),
            ranking_keyword: Some("MY_SCORE".to_owned()),
            additional_instructions: None,
        };
        let messages = build_prompt("a", &template, &variables);
        assert!(messages[1].content.contains("MY_SCORE"));
        assert_eq!(ranking_keyword(&template, &variables), "MY_SCORE");
    }
}
