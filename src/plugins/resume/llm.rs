//! LLM-first resume parsing.
//!
//! Delegates structured extraction to an LLM with a strict JSON-schema
//! prompt, recovers the JSON from whatever formatting the model wrapped it
//! in, rejects insufficient output, and post-processes the result: NFC
//! normalization, repair of spacing-acute-accent sequences, and conservative
//! re-attachment of `%` symbols the model dropped.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::providers::factory::ProviderFactory;
use crate::providers::{ChatMessage, CompletionRequest};

use super::models::ResumeData;

/// Truncation bound keeping the prompt inside model context limits.
const MAX_TEXT_LENGTH: usize = 50_000;
/// Minimum recognisable content for a parse to count as a success.
const MIN_CONTENT_CHARS: usize = 100;
/// Minimum populated fields for a parse to count as a success.
const MIN_NON_EMPTY_FIELDS: usize = 3;

const SYSTEM_PROMPT: &str = "You are an expert resume parser. Output ONLY valid JSON. \
     No explanations, no text before or after the JSON.";

/// Inputs for one LLM parsing call.
#[derive(Debug, Clone)]
pub struct LlmParseOptions {
    /// Provider name (`openai` or `anthropic`).
    pub provider: String,
    /// Model identifier (typically the cheap parsing model).
    pub model: String,
    /// API key for the provider.
    pub api_key: String,
    /// Request timeout.
    pub timeout: std::time::Duration,
}

/// Parse resume text with an LLM.
///
/// # Errors
///
/// Returns an error when the provider call fails or the model output cannot
/// be recovered as sufficient JSON.
pub async fn parse_with_llm(
    text: &str,
    factory: &Arc<ProviderFactory>,
    options: &LlmParseOptions,
) -> Result<ResumeData> {
    let truncated: String = text.chars().take(MAX_TEXT_LENGTH).collect();
    let prompt = build_prompt(&truncated);

    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

    // Prefill the assistant turn so the model has no room for prose before
    // the JSON object. OpenAI does not need (or accept) this trick.
    let prefilled = options.provider == "anthropic";
    if prefilled {
        messages.push(ChatMessage::assistant("{"));
    }

    let provider = factory.get(&options.provider, options.timeout)?;

    let mut request = CompletionRequest::new(&options.model, messages, &options.api_key);
    request.temperature = Some(0.1);
    request.max_tokens = Some(2000);

    info!(provider = %options.provider, model = %options.model, "calling LLM for resume parsing");
    let completion = provider.complete(request).await?;

    let mut content = completion.content;
    // The prefilled "{" is not echoed back; restore it before parsing.
    if prefilled && !content.trim_start().starts_with('{') {
        content = format!("{{{content}");
    }

    let parsed = parse_llm_response(&content)?;
    let normalized = normalize_resume_data(text, parsed);

    serde_json::from_value(normalized).map_err(|e| Error::Validation {
        field: "parsed_resume".to_owned(),
        reason: format!("LLM output did not match the resume schema: {e}"),
    })
}

fn build_prompt(text: &str) -> String {
    format!(
        r#"Parse the following resume text into a structured JSON format that follows this exact schema:

```json
{{
  "personal_info": {{
    "name": "string or null",
    "email": "string or null",
    "phone": "string or null",
    "location": "string or null"
  }},
  "education": [
    {{
      "institution": "string",
      "degree": "string or null",
      "period": "string or null",
      "details": "string or null"
    }}
  ],
  "experience": [
    {{
      "company": "string",
      "title": "string or null",
      "period": "string or null",
      "responsibilities": ["string"]
    }}
  ],
  "skills": ["string"],
  "projects": [
    {{
      "name": "string or null",
      "description": "string or null",
      "technologies": ["string"],
      "url": "string or null"
    }}
  ],
  "languages": [
    {{
      "language": "string",
      "proficiency": "string or null"
    }}
  ]
}}
```

STRICT REQUIREMENTS:
1. Output MUST be valid, parseable JSON. Return ONLY the JSON object with no additional text.
2. Preserve Unicode accents/diacritics exactly (UTF-8). Do NOT replace characters like á, é, í, ó, ú, ü, ñ, ç.
3. Periods must be extracted from the same section as company/title. Recognize and preserve Present/Currently (e.g., "May 2025 – Present"). Accept formats like "Jan. 2024 – Present", "July 2023 – Oct. 2023", or "2021–2023".
4. Retain symbols and units (%, $, k, M) exactly as written.
5. Include ONLY 2–3 most recent education entries, 3–4 most recent experience entries, and 5–10 key skills.
6. Keep responsibility descriptions very brief (1–2 sentences max).
7. Include ONLY information explicitly present in the text. If information is not present, use null (for scalars) or an empty array (for lists). Do NOT guess or infer.
8. Use only the keys defined in the schema above. Do not add extra keys.
9. LIMIT TOTAL OUTPUT to 1500 words maximum.
10. Return ONLY the JSON object. No explanations, no additional text.

RESUME TEXT:
{text}
"#
    )
}

/// Recover the JSON object from an LLM reply.
///
/// Tries a fenced ```json block first, then balanced-brace extraction from
/// the first `{{`, then the whole reply. Output with fewer than 100 chars of
/// content or fewer than 3 populated fields is treated as a failure.
///
/// # Errors
///
/// Returns [`Error::Validation`] when no sufficient JSON can be recovered.
pub fn parse_llm_response(response_text: &str) -> Result<Value> {
    let json_str = extract_json_candidate(response_text).ok_or_else(|| Error::Validation {
        field: "llm_response".to_owned(),
        reason: "No JSON object found in response".to_owned(),
    })?;

    let parsed: Value = serde_json::from_str(&json_str).map_err(|e| {
        warn!(
            preview = preview(&json_str),
            error = %e,
            "JSON parsing failed"
        );
        Error::Validation {
            field: "llm_response".to_owned(),
            reason: format!("Failed to parse JSON from LLM response: {e}"),
        }
    })?;

    let content_length = content_length(&parsed);
    let populated = non_empty_fields(&parsed);
    if content_length < MIN_CONTENT_CHARS || populated < MIN_NON_EMPTY_FIELDS {
        return Err(Error::Validation {
            field: "llm_response".to_owned(),
            reason: format!(
                "LLM returned insufficient resume data (content_length={content_length}, fields={populated})"
            ),
        });
    }

    Ok(parsed)
}

fn extract_json_candidate(response_text: &str) -> Option<String> {
    if let Ok(fence_re) = Regex::new(r"(?s)```json\s*(.*?)\s*```") {
        if let Some(captures) = fence_re.captures(response_text) {
            if let Some(inner) = captures.get(1) {
                return Some(inner.as_str().trim().to_owned());
            }
        }
    }

    let start = response_text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in response_text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth = depth.saturating_add(1),
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start.saturating_add(offset).saturating_add(c.len_utf8());
                    return Some(response_text[start..end].to_owned());
                }
            }
            _ => {}
        }
    }

    // Unbalanced braces: hand the whole reply to the JSON parser.
    Some(response_text.trim().to_owned())
}

fn preview(text: &str) -> String {
    if text.chars().count() > 100 {
        let head: String = text.chars().take(100).collect();
        format!("{head}...")
    } else {
        text.to_owned()
    }
}

fn content_length(value: &Value) -> usize {
    match value {
        Value::String(s) => s.trim().chars().count(),
        Value::Object(map) => map.values().map(content_length).sum(),
        Value::Array(items) => items.iter().map(content_length).sum(),
        _ => 0,
    }
}

fn non_empty_fields(value: &Value) -> usize {
    let mut fields = 0usize;
    let personal = value.get("personal_info");
    for key in ["name", "email"] {
        if personal
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
        {
            fields = fields.saturating_add(1);
        }
    }
    for key in ["education", "experience", "skills", "projects", "languages"] {
        let count = value
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        fields = fields.saturating_add(count);
    }
    fields
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize LLM-parsed resume data: NFC, spacing-acute repair, whitespace
/// collapse, and conservative `%` re-attachment based on the original text.
pub fn normalize_resume_data(original_text: &str, data: Value) -> Value {
    let mut normalized = walk_and_normalize(data);
    fix_percent_units(original_text, &mut normalized);
    normalized
}

fn walk_and_normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, walk_and_normalize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(walk_and_normalize).collect()),
        Value::String(s) => Value::String(normalize_string(&s)),
        other => other,
    }
}

fn normalize_string(value: &str) -> String {
    let mut normalized: String = value.nfc().collect();

    // PDF extractors emit spacing acute accents (U+00B4) detached from their
    // vowels; rebuild the precomposed characters.
    for (seq, rep) in [
        ("´a", "á"),
        ("´e", "é"),
        ("´i", "í"),
        ("´o", "ó"),
        ("´u", "ú"),
        ("´A", "Á"),
        ("´E", "É"),
        ("´I", "Í"),
        ("´O", "Ó"),
        ("´U", "Ú"),
    ] {
        normalized = normalized.replace(seq, rep);
    }

    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Re-attach a `%` to numbers the original text shows with one but the
/// parsed responsibilities lost. Conservative: only the first bare
/// occurrence in lines that carry no `%` at all.
fn fix_percent_units(original_text: &str, parsed: &mut Value) {
    let Ok(percent_re) = Regex::new(r"(\d{1,3})%") else {
        return;
    };
    let Ok(bare_number_re) = Regex::new(r"\b(\d{1,3})\b") else {
        return;
    };

    let percent_numbers: std::collections::HashSet<String> = percent_re
        .captures_iter(original_text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_owned()))
        .collect();
    if percent_numbers.is_empty() {
        return;
    }

    let Some(experience) = parsed.get_mut("experience").and_then(Value::as_array_mut) else {
        return;
    };

    for entry in experience {
        let Some(responsibilities) = entry
            .get_mut("responsibilities")
            .and_then(Value::as_array_mut)
        else {
            continue;
        };
        for line in responsibilities {
            let Some(text) = line.as_str() else { continue };
            if text.contains('%') {
                continue;
            }
            let hit = bare_number_re
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_owned());
            if let Some(number) = hit {
                if percent_numbers.contains(&number) {
                    *line = Value::String(text.replacen(&number, &format!("{number}%"), 1));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sufficient_resume_json() -> String {
        json!({
            "personal_info": {"name": "Jane Doe", "email": "jane@example.com"},
            "education": [{"institution": "MIT", "degree": "MSc", "period": "2019-2021"}],
            "experience": [{
                "company": "Acme",
                "title": "Engineer",
                "period": "2021 - Present",
                "responsibilities": ["Shipped the training pipeline end to end"]
            }],
            "skills": ["Python", "Rust", "PyTorch"],
            "projects": [],
            "languages": []
        })
        .to_string()
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed = parse_llm_response(&sufficient_resume_json()).expect("should parse");
        assert_eq!(parsed["personal_info"]["name"], "Jane Doe");
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("Here you go:\n```json\n{}\n```", sufficient_resume_json());
        let parsed = parse_llm_response(&fenced).expect("should parse");
        assert_eq!(parsed["education"][0]["institution"], "MIT");
    }

    #[test]
    fn test_parse_json_with_surrounding_prose() {
        let wrapped = format!("Sure! {} Hope this helps.", sufficient_resume_json());
        let parsed = parse_llm_response(&wrapped).expect("should parse");
        assert_eq!(parsed["skills"][0], "Python");
    }

    #[test]
    fn test_insufficient_content_rejected() {
        let thin = json!({
            "personal_info": {"name": "J"},
            "education": [],
            "experience": [],
            "skills": [],
            "projects": [],
            "languages": []
        })
        .to_string();
        let err = parse_llm_response(&thin).expect_err("thin data should fail");
        assert!(err.to_string().contains("insufficient"), "{err}");
    }

    #[test]
    fn test_no_json_rejected() {
        assert!(parse_llm_response("I could not parse that resume.").is_err());
    }

    #[test]
    fn test_normalize_fixes_spacing_acute() {
        let data = json!({"personal_info": {"name": "Jos´e Garc´ia"}});
        let normalized = normalize_resume_data("", data);
        assert_eq!(normalized["personal_info"]["name"], "José García");
    }

    #[test]
    fn test_percent_reattachment() {
        let original = "Improved model accuracy by 12% over baseline";
        let data = json!({
            "experience": [{
                "company": "Acme",
                "responsibilities": ["Improved model accuracy by 12"]
            }]
        });
        let normalized = normalize_resume_data(original, data);
        assert_eq!(
            normalized["experience"][0]["responsibilities"][0],
            "Improved model accuracy by 12%"
        );
    }

    #[test]
    fn test_percent_not_attached_when_absent_in_source() {
        let original = "Managed a team of 12 engineers";
        let data = json!({
            "experience": [{
                "company": "Acme",
                "responsibilities": ["Managed a team of 12 engineers"]
            }]
        });
        let normalized = normalize_resume_data(original, data);
        assert_eq!(
            normalized["experience"][0]["responsibilities"][0],
            "Managed a team of 12 engineers"
        );
    }
}
