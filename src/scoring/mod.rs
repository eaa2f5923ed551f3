//! Lenient per-axis score extraction from free-form LLM output.
//!
//! Models format their verdicts dozens of ways; the extractor runs a cascade
//! of patterns from most-specific (the exact ranking keyword) to
//! least-specific (the first plausible digit in a paragraph mentioning the
//! axis), stopping at the first match inside [1, 5]. When extending the
//! cascade, add a new pattern rather than loosening an existing one.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lowest accepted score.
pub const MIN_SCORE: i32 = 1;
/// Highest accepted score.
pub const MAX_SCORE: i32 = 5;

/// Score for one evaluation axis. `score` is `None` when no pattern matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisScore {
    /// Axis name.
    pub name: String,
    /// Extracted integer score in [1, 5], or null.
    pub score: Option<i32>,
}

/// Run `pattern` against `text` and return its first capture as a validated
/// score. Invalid patterns are skipped (with a warning) rather than failing
/// the extraction.
fn try_pattern(text: &str, pattern: &str) -> Option<i32> {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => {
            warn!(pattern, error = %e, "skipping invalid score pattern");
            return None;
        }
    };
    let captures = regex.captures(text)?;
    let score: i32 = captures.get(1)?.as_str().parse().ok()?;
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Some(score)
    } else {
        None
    }
}

/// Keyword-anchored patterns, most specific first.
fn keyword_patterns(keyword: &str) -> Vec<String> {
    let kw = regex::escape(keyword);
    vec![
        // The canonical form: the keyword, then anything non-numeric, then
        // the digit. Case-sensitive on purpose.
        format!(r"{kw}[^0-9]*([1-5])"),
        format!(r"{kw}\s*=\s*([1-5])"),
        format!(r"{kw}:\s*([1-5])"),
        format!(r"{kw}\s*-\s*([1-5])"),
        format!(r"{kw}.*?([1-5])/5"),
    ]
}

/// Axis-name-derived patterns, in decreasing specificity.
fn axis_name_patterns(axis_name: &str) -> Vec<String> {
    let axis = regex::escape(axis_name);
    let axis_upper = regex::escape(&axis_name.to_uppercase());
    vec![
        // Upper-case axis name with the _RATING suffix.
        format!(r"{axis_upper}_RATING\s*=\s*([1-5])"),
        format!(r"{axis_upper}_RATING:\s*([1-5])"),
        format!(r"{axis}_RATING\s*=\s*([1-5])"),
        format!(r"{axis}_RATING:\s*([1-5])"),
        // Bare upper-case axis name.
        format!(r"{axis_upper}\s*=\s*([1-5])"),
        format!(r"{axis_upper}:\s*([1-5])"),
        // Single-axis-era keyword carried over by some models.
        format!(r"FINAL_RANKING for {axis}\s*=\s*([1-5])"),
        // Plain "Axis = N" / "Axis: N".
        format!(r"{axis}\s*=\s*([1-5])"),
        format!(r"{axis}:\s*([1-5])"),
        format!(r"{axis} Rating\s*=\s*([1-5])"),
        format!(r"{axis} Rating:\s*([1-5])"),
        // Any line with the axis name and a number.
        format!(r"{axis}.*?([1-5])\s*(/5|out of 5)?"),
        // Permissive, case-insensitive.
        format!(r"(?i){axis}.*?([1-5])"),
        format!(r"(?i)\b{axis}\b.*?([1-5])\b"),
        format!(r"(?i)score for {axis}.*?([1-5])"),
    ]
}

/// Section-based patterns: markdown headers, bold labels, assessment
/// sections, and limited-context windows around "score"/"rating".
fn section_patterns(axis_name: &str) -> Vec<String> {
    let axis = regex::escape(axis_name);
    vec![
        format!(r"(?i)##\s*{axis}[\s\S]*?([1-5])(?:[^0-9]|$)"),
        format!(r"(?i)###\s*{axis}[\s\S]*?([1-5])(?:[^0-9]|$)"),
        format!(r"(?i)\*\*{axis}\*\*[\s\S]*?([1-5])(?:[^0-9]|$)"),
        format!(r"(?i)\*\*{axis}:[^*]*\*\*[\s\S]*?([1-5])(?:[^0-9]|$)"),
        format!(r"(?i){axis}\s*assessment[\s\S]*?([1-5])(?:[^0-9]|$)"),
        format!(r"(?i){axis}\s*evaluation[\s\S]*?([1-5])(?:[^0-9]|$)"),
        format!(r"(?i){axis}[^#\*]*?\b([1-5])\b"),
        format!(r"(?i)\b{axis}\b[\s\S]{{0,500}}?\bscore\b[\s\S]{{0,50}}?([1-5])"),
        format!(r"(?i)\b{axis}\b[\s\S]{{0,500}}?\brating\b[\s\S]{{0,50}}?([1-5])"),
        format!(r"(?i)\b{axis}\b[\s\S]{{0,500}}?\b([1-5])/5\b"),
    ]
}

/// Last resort: the first bare digit in the first paragraph mentioning the
/// axis name, case-insensitively.
fn paragraph_fallback(text: &str, axis_name: &str) -> Option<i32> {
    let needle = axis_name.to_lowercase();
    let digit_re = Regex::new(r"\b([1-5])\b").ok()?;

    for paragraph in Regex::new(r"\n\n+").ok()?.split(text) {
        if !paragraph.to_lowercase().contains(&needle) {
            continue;
        }
        if let Some(captures) = digit_re.captures(paragraph) {
            if let Ok(score) = captures.get(1)?.as_str().parse::<i32>() {
                if (MIN_SCORE..=MAX_SCORE).contains(&score) {
                    return Some(score);
                }
            }
        }
        return None;
    }
    None
}

/// Extract a single score located by `ranking_keyword`.
///
/// Uses the keyword-anchored stages of the cascade; returns `None` when no
/// pattern yields a value in [1, 5].
pub fn extract_score(text: &str, ranking_keyword: &str) -> Option<i32> {
    keyword_patterns(ranking_keyword)
        .iter()
        .find_map(|pattern| try_pattern(text, pattern))
}

/// Extract one score per axis, in the order the axes are given.
///
/// `axis_keywords` maps axis display names to their ranking keywords. For
/// each axis, the cascade runs: exact keyword forms, axis-name forms,
/// section forms, then the paragraph fallback; the first hit in [1, 5] wins
/// and a miss records a null score. Extraction is deterministic: identical
/// input yields identical output.
pub fn extract_multi_axis_scores(text: &str, axis_keywords: &[(String, String)]) -> Vec<AxisScore> {
    let mut scores = Vec::with_capacity(axis_keywords.len());

    for (axis_name, keyword) in axis_keywords {
        let score = keyword_patterns(keyword)
            .iter()
            .chain(axis_name_patterns(axis_name).iter())
            .find_map(|pattern| try_pattern(text, pattern))
            .or_else(|| {
                section_patterns(axis_name)
                    .iter()
                    .find_map(|pattern| try_pattern(text, pattern))
            })
            .or_else(|| paragraph_fallback(text, axis_name));

        if score.is_none() {
            debug!(axis = %axis_name, "no score pattern matched");
        }
        scores.push(AxisScore {
            name: axis_name.clone(),
            score,
        });
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(name, kw)| ((*name).to_owned(), (*kw).to_owned()))
            .collect()
    }

    #[test]
    fn test_canonical_multi_axis_block() {
        let text = "## General Promise\nreasoning here\nGENERAL_PROMISE_RATING = 4\n\n## ML Skills\nML_SKILLS_RATING: 3";
        let scores = extract_multi_axis_scores(
            text,
            &keywords(&[
                ("General Promise", "GENERAL_PROMISE_RATING"),
                ("ML Skills", "ML_SKILLS_RATING"),
            ]),
        );
        assert_eq!(
            scores,
            vec![
                AxisScore {
                    name: "General Promise".to_owned(),
                    score: Some(4)
                },
                AxisScore {
                    name: "ML Skills".to_owned(),
                    score: Some(3)
                },
            ]
        );
    }

    #[test]
    fn test_missing_axis_records_null() {
        let text = "GENERAL_PROMISE_RATING = 4";
        let scores = extract_multi_axis_scores(
            text,
            &keywords(&[
                ("General Promise", "GENERAL_PROMISE_RATING"),
                ("Policy", "POLICY_RATING"),
            ]),
        );
        assert_eq!(scores[1].name, "Policy");
        assert_eq!(scores[1].score, None);
    }

    #[test]
    fn test_formatting_variants() {
        for text in [
            "GENERAL_PROMISE_RATING = 4",
            "GENERAL_PROMISE_RATING: 4",
            "GENERAL_PROMISE_RATING - 4",
            "GENERAL_PROMISE_RATING comes out at 4/5",
            "General Promise = 4",
            "General Promise: 4",
            "General Promise Rating: 4",
            "FINAL_RANKING for General Promise = 4",
            "**General Promise**\nThe candidate earns a 4 here.",
            "### General Promise\nSolid work overall: 4",
        ] {
            let scores = extract_multi_axis_scores(
                text,
                &keywords(&[("General Promise", "GENERAL_PROMISE_RATING")]),
            );
            assert_eq!(scores[0].score, Some(4), "failed on: {text}");
        }
    }

    #[test]
    fn test_out_of_range_scores_discarded() {
        // 7 is invalid; the cascade must keep looking and find nothing.
        let text = "GENERAL_PROMISE_RATING = 7";
        let scores = extract_multi_axis_scores(
            text,
            &keywords(&[("General Promise", "GENERAL_PROMISE_RATING")]),
        );
        assert_eq!(scores[0].score, None);
    }

    #[test]
    fn test_keyword_match_is_case_sensitive_but_fallbacks_are_not() {
        let text = "general promise looks strong, I'd say 4 overall";
        let scores = extract_multi_axis_scores(
            text,
            &keywords(&[("General Promise", "GENERAL_PROMISE_RATING")]),
        );
        assert_eq!(scores[0].score, Some(4));
    }

    #[test]
    fn test_paragraph_fallback() {
        let text = "Intro paragraph.\n\nThinking about policy experience, the record is thin. 2 seems right.\n\nOther text.";
        let scores =
            extract_multi_axis_scores(text, &keywords(&[("Policy Experience", "POLICY_RATING")]));
        assert_eq!(scores[0].score, Some(2));
    }

    #[test]
    fn test_determinism() {
        let text = "ML_SKILLS_RATING = 3 and later maybe ML Skills: 5";
        let kw = keywords(&[("ML Skills", "ML_SKILLS_RATING")]);
        let first = extract_multi_axis_scores(text, &kw);
        for _ in 0..10 {
            assert_eq!(extract_multi_axis_scores(text, &kw), first);
        }
    }

    #[test]
    fn test_single_axis_extract() {
        assert_eq!(
            extract_score("blah FINAL_RANKING = 5 blah", "FINAL_RANKING"),
            Some(5)
        );
        assert_eq!(extract_score("no score here", "FINAL_RANKING"), None);
        assert_eq!(extract_score("FINAL_RANKING = 9", "FINAL_RANKING"), None);
    }

    #[test]
    fn test_scores_follow_axis_order() {
        let text = "ML_SKILLS_RATING = 2\nGENERAL_PROMISE_RATING = 5";
        let scores = extract_multi_axis_scores(
            text,
            &keywords(&[
                ("General Promise", "GENERAL_PROMISE_RATING"),
                ("ML Skills", "ML_SKILLS_RATING"),
            ]),
        );
        assert_eq!(scores[0].name, "General Promise");
        assert_eq!(scores[0].score, Some(5));
        assert_eq!(scores[1].score, Some(2));
    }
}
