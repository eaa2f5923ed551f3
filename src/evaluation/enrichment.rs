//! Enrichment phase of the evaluation pipeline.
//!
//! Fetches profile data (via the LinkedIn plugin) and parsed resume data
//! (via the PDF plugin), merges the results, and renders them into the
//! human-readable block appended to the applicant text. Every failure is
//! captured into the per-request enrichment log and never aborts the
//! evaluation.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::plugins::{PluginManager, PluginRequest};

/// Result of the enrichment phase.
#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    /// Structured enrichment data (`linkedin`, `pdf` or `combined` shape).
    pub data: Option<Value>,
    /// Raw profile JSON for the diagnostic appendix.
    pub linkedin_json: Option<String>,
    /// Raw parsed-resume JSON for the diagnostic appendix.
    pub pdf_json: Option<String>,
}

/// Run the enrichment phase for one evaluation request.
///
/// The profile plugin runs when the source URL is a LinkedIn profile; the
/// resume plugin runs when a PDF URL is present, or the source URL is not a
/// profile URL. The two fetches run one after the other and their results
/// merge into a `combined` structure when both succeed.
pub async fn run_enrichment(
    plugin_manager: &Arc<PluginManager>,
    source_url: Option<&str>,
    pdf_url: Option<&str>,
    provider_hint: &str,
    log: &mut Vec<String>,
) -> EnrichmentOutcome {
    let mut outcome = EnrichmentOutcome::default();

    let Some(source_url) = source_url else {
        return outcome;
    };
    log.push(format!("Enrichment requested for URL: {source_url}"));

    let mut linkedin_data = None;
    if source_url.contains("linkedin.com") {
        if let Some((data, raw)) =
            process_linkedin_enrichment(plugin_manager, source_url, log).await
        {
            outcome.linkedin_json = Some(raw);
            linkedin_data = Some(data);
        }
    }

    let mut pdf_data = None;
    let effective_pdf_url = pdf_url.or_else(|| {
        if source_url.contains("linkedin.com") {
            None
        } else {
            Some(source_url)
        }
    });
    if let Some(pdf_url) = effective_pdf_url {
        if let Some((data, raw)) =
            process_pdf_enrichment(plugin_manager, pdf_url, provider_hint, log).await
        {
            outcome.pdf_json = Some(raw);
            pdf_data = Some(data);
        }
    }

    outcome.data = match (linkedin_data, pdf_data) {
        (Some(linkedin), Some(pdf)) => Some(json!({
            "type": "combined",
            "data": {
                "linkedin": linkedin.get("data").cloned().unwrap_or(Value::Null),
                "pdf": pdf.get("data").cloned().unwrap_or(Value::Null),
            }
        })),
        (Some(linkedin), None) => Some(linkedin),
        (None, Some(pdf)) => Some(pdf),
        (None, None) => {
            let message = format!("Unrecognized source URL format: {source_url}");
            warn!("{message}");
            log.push(message);
            None
        }
    };

    outcome
}

/// Fetch LinkedIn profile data through the plugin manager.
async fn process_linkedin_enrichment(
    plugin_manager: &Arc<PluginManager>,
    source_url: &str,
    log: &mut Vec<String>,
) -> Option<(Value, String)> {
    info!(url = source_url, "detected LinkedIn profile URL");
    log.push(format!("Detected LinkedIn profile URL: {source_url}"));

    let username = source_url
        .split("linkedin.com/in/")
        .nth(1)
        .map(|rest| rest.split('/').next().unwrap_or(rest).to_owned())
        .unwrap_or_else(|| source_url.to_owned());
    log.push(format!("Extracted LinkedIn username: {username}"));

    let request = PluginRequest::new("get_person_profile").with_param("linkedin_username", username);

    match plugin_manager
        .execute_plugin("linkedin_external", &request)
        .await
    {
        Ok(response) if response.is_success() && response.data.is_some() => {
            let data = response.data.unwrap_or(Value::Null);
            log.push("LinkedIn enrichment successful".to_owned());
            log.push(format!(
                "Retrieved profile data: {} characters",
                data.to_string().len()
            ));
            let raw = serde_json::to_string_pretty(&data).ok()?;
            Some((json!({ "type": "linkedin", "data": data }), raw))
        }
        Ok(response) => {
            // A login timeout means an expired cookie; that is actionable.
            let login_failure = response
                .data
                .as_ref()
                .and_then(|d| d.get("error"))
                .and_then(Value::as_str)
                == Some("login_timeout");
            if login_failure {
                let detail = response
                    .data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("Cookie may be expired");
                let message = format!("LinkedIn authentication failed: {detail}");
                error!("{message}");
                log.push(message);
                log.push(
                    "IMPORTANT: Update the LINKEDIN_COOKIE environment variable with a fresh cookie"
                        .to_owned(),
                );
            } else {
                let message = format!(
                    "LinkedIn plugin failed: {}",
                    response.error.unwrap_or_else(|| "unknown error".to_owned())
                );
                error!("{message}");
                log.push(message);
            }
            None
        }
        Err(e) => {
            let message = format!("LinkedIn plugin error: {e}");
            error!("{message}");
            log.push(message);
            None
        }
    }
}

/// Fetch and parse a PDF resume through the plugin manager.
async fn process_pdf_enrichment(
    plugin_manager: &Arc<PluginManager>,
    pdf_url: &str,
    provider_hint: &str,
    log: &mut Vec<String>,
) -> Option<(Value, String)> {
    info!(url = pdf_url, "processing PDF resume URL");
    log.push(format!("Processing PDF URL: {pdf_url}"));

    // The plugin resolves its own fast parsing model for the provider.
    let request = PluginRequest::new("parse_resume")
        .with_param("pdf_url", pdf_url)
        .with_param("llm_provider", provider_hint);

    match plugin_manager
        .execute_plugin("pdf_resume_parser", &request)
        .await
    {
        Ok(response) if response.is_success() && response.data.is_some() => {
            let data = response.data.unwrap_or(Value::Null);
            log.push("PDF resume enrichment successful".to_owned());
            let raw = serde_json::to_string_pretty(&data).ok()?;
            Some((json!({ "type": "pdf", "data": data }), raw))
        }
        Ok(response) => {
            let message = format!(
                "PDF resume plugin failed: {}",
                response.error.unwrap_or_else(|| "unknown error".to_owned())
            );
            error!("{message}");
            log.push(message);
            None
        }
        Err(e) => {
            let message = format!("PDF resume plugin error: {e}");
            error!("{message}");
            log.push(message);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{head}...")
    } else {
        text.to_owned()
    }
}

fn str_of<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

fn format_linkedin_block(formatted: &mut String, data: &Value) {
    formatted.push_str("## LinkedIn Profile\n");

    if let Some(name) = str_of(data, "name") {
        formatted.push_str(&format!("Name: {name}\n"));
    }

    let experience = data
        .get("experience")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let current_title = experience.first().and_then(|e| str_of(e, "title"));
    let current_company = experience.first().and_then(|e| str_of(e, "company"));
    match (current_title, current_company) {
        (Some(title), Some(company)) if !title.is_empty() && !company.is_empty() => {
            formatted.push_str(&format!("Current Position: {title} at {company}\n"));
        }
        _ => {
            if let Some(headline) = str_of(data, "headline") {
                formatted.push_str(&format!("Headline: {headline}\n"));
            }
        }
    }

    if let Some(about) = str_of(data, "about").filter(|a| !a.is_empty()) {
        formatted.push_str(&format!("About: {}\n", excerpt(about, 200)));
    }

    if !experience.is_empty() {
        formatted.push_str("\n### Work Experience\n");
        for exp in experience.iter().take(3) {
            let title = str_of(exp, "title").unwrap_or_default();
            let company = str_of(exp, "company").unwrap_or_default();
            let from_date = str_of(exp, "from_date").unwrap_or_default();
            let to_date = str_of(exp, "to_date").unwrap_or("Present");

            formatted.push_str(&format!("- {title} at {company}"));
            if !from_date.is_empty() || !to_date.is_empty() {
                formatted.push_str(&format!(" ({from_date} - {to_date})"));
            }
            formatted.push('\n');

            if let Some(description) = str_of(exp, "description").filter(|d| !d.is_empty()) {
                formatted.push_str(&format!("  {}\n", excerpt(description, 200)));
            }
        }
        if experience.len() > 3 {
            formatted.push_str(&format!(
                "  ... and {} more positions\n",
                experience.len().saturating_sub(3)
            ));
        }
    }

    if let Some(education) = data.get("education").and_then(Value::as_array) {
        if !education.is_empty() {
            formatted.push_str("\n### Education\n");
            for edu in education {
                let degree = str_of(edu, "degree").unwrap_or_default();
                let institution = str_of(edu, "institution")
                    .or_else(|| str_of(edu, "school"))
                    .unwrap_or_default();
                formatted.push_str(&format!("- {degree} at {institution}\n"));
                if let Some(description) = str_of(edu, "description").filter(|d| !d.is_empty()) {
                    formatted.push_str(&format!("  {}\n", excerpt(description, 150)));
                }
            }
        }
    }

    if let Some(skills) = data.get("skills").and_then(Value::as_array) {
        if !skills.is_empty() {
            formatted.push_str("\n### Skills\n");
            let list: Vec<&str> = skills.iter().filter_map(Value::as_str).take(15).collect();
            let shown = list.len();
            let mut line = list.join(", ");
            if skills.len() > shown {
                line.push_str(&format!(
                    ", and {} more",
                    skills.len().saturating_sub(shown)
                ));
            }
            formatted.push_str(&format!("{line}\n"));
        }
    }
}

fn format_pdf_block(formatted: &mut String, data: &Value) {
    let parsed = data.get("parsed_resume").cloned().unwrap_or(Value::Null);
    if parsed.is_null() {
        return;
    }

    formatted.push_str("\n## PDF Resume Information\n");

    if let Some(personal) = parsed.get("personal_info") {
        for (key, label) in [
            ("name", "Name"),
            ("email", "Email"),
            ("phone", "Phone"),
            ("location", "Location"),
        ] {
            if let Some(value) = str_of(personal, key).filter(|v| !v.is_empty()) {
                formatted.push_str(&format!("{label}: {value}\n"));
            }
        }
    }

    if let Some(education) = parsed.get("education").and_then(Value::as_array) {
        if !education.is_empty() {
            formatted.push_str("\n### Education from Resume\n");
            for edu in education.iter().take(3) {
                let institution = str_of(edu, "institution").unwrap_or_default();
                let degree = str_of(edu, "degree").filter(|d| !d.is_empty());
                let period = str_of(edu, "period").unwrap_or_default();

                formatted.push_str(&format!(
                    "- {} at {institution}",
                    degree.unwrap_or("Degree not specified")
                ));
                if !period.is_empty() {
                    formatted.push_str(&format!(" ({period})"));
                }
                formatted.push('\n');

                if let Some(details) = str_of(edu, "details").filter(|d| !d.is_empty()) {
                    formatted.push_str(&format!("  {details}\n"));
                }
            }
            if education.len() > 3 {
                formatted.push_str(&format!(
                    "  ... and {} more education entries\n",
                    education.len().saturating_sub(3)
                ));
            }
        }
    }

    if let Some(experience) = parsed.get("experience").and_then(Value::as_array) {
        if !experience.is_empty() {
            formatted.push_str("\n### Work Experience from Resume\n");
            for exp in experience.iter().take(3) {
                let company = str_of(exp, "company").unwrap_or_default();
                let title = str_of(exp, "title").filter(|t| !t.is_empty());
                let period = str_of(exp, "period").unwrap_or_default();

                formatted.push_str(&format!(
                    "- {} at {company}",
                    title.unwrap_or("Role not specified")
                ));
                if !period.is_empty() {
                    formatted.push_str(&format!(" ({period})"));
                }
                formatted.push('\n');

                let responsibilities = exp
                    .get("responsibilities")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for resp in responsibilities.iter().take(2).filter_map(|r| r.as_str()) {
                    formatted.push_str(&format!("  - {resp}\n"));
                }
                if responsibilities.len() > 2 {
                    formatted.push_str(&format!(
                        "  - ... and {} more responsibilities\n",
                        responsibilities.len().saturating_sub(2)
                    ));
                }
            }
            if experience.len() > 3 {
                formatted.push_str(&format!(
                    "  ... and {} more experience entries\n",
                    experience.len().saturating_sub(3)
                ));
            }
        }
    }

    if let Some(skills) = parsed.get("skills").and_then(Value::as_array) {
        if !skills.is_empty() {
            formatted.push_str("\n### Skills from Resume\n");
            let list: Vec<&str> = skills.iter().filter_map(Value::as_str).take(15).collect();
            let shown = list.len();
            let mut line = list.join(", ");
            if skills.len() > shown {
                line.push_str(&format!(
                    ", and {} more",
                    skills.len().saturating_sub(shown)
                ));
            }
            formatted.push_str(&format!("{line}\n"));
        }
    }

    if let Some(languages) = parsed.get("languages").and_then(Value::as_array) {
        if !languages.is_empty() {
            formatted.push_str("\n### Languages\n");
            for lang in languages {
                let language = str_of(lang, "language").unwrap_or_default();
                if language.is_empty() {
                    continue;
                }
                formatted.push_str(&format!("- {language}"));
                if let Some(proficiency) = str_of(lang, "proficiency").filter(|p| !p.is_empty()) {
                    formatted.push_str(&format!(" ({proficiency})"));
                }
                formatted.push('\n');
            }
        }
    }
}

/// Render structured enrichment data into the text block appended to the
/// applicant data.
pub fn format_enrichment_data(enrichment_data: &Value) -> String {
    let mut formatted = "### CANDIDATE PROFILE INFORMATION\n\n".to_owned();
    let data_type = str_of(enrichment_data, "type").unwrap_or("unknown");
    let data = enrichment_data.get("data").cloned().unwrap_or(Value::Null);

    match data_type {
        "combined" => {
            if let Some(linkedin) = data.get("linkedin").filter(|v| !v.is_null()) {
                format_linkedin_block(&mut formatted, linkedin);
            }
            if let Some(pdf) = data.get("pdf").filter(|v| !v.is_null()) {
                format_pdf_block(&mut formatted, pdf);
            }
        }
        "linkedin" => format_linkedin_block(&mut formatted, &data),
        "pdf" => format_pdf_block(&mut formatted, &data),
        other => {
            formatted.push_str(&format!("## Data from {other}:\n"));
            formatted.push_str(&serde_json::to_string_pretty(&data).unwrap_or_default());
        }
    }

    formatted
}
