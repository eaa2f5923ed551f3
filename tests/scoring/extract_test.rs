//! Score extraction against the shipped SPAR template.

use straylight::prompts::spar::spar_template;
use straylight::scoring::{extract_multi_axis_scores, extract_score, AxisScore};

#[test]
fn canonical_block_extracts_in_template_order() {
    let text = "## General Promise\nreasoning here\nGENERAL_PROMISE_RATING = 4\n\n## ML Skills\nML_SKILLS_RATING: 3";
    let keywords = vec![
        ("General Promise".to_owned(), "GENERAL_PROMISE_RATING".to_owned()),
        ("ML Skills".to_owned(), "ML_SKILLS_RATING".to_owned()),
    ];

    let scores = extract_multi_axis_scores(text, &keywords);
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
fn missing_axis_yields_null() {
    let text = "## General Promise\nGENERAL_PROMISE_RATING = 4\n\n## ML Skills\nML_SKILLS_RATING: 3";
    let keywords = vec![
        ("General Promise".to_owned(), "GENERAL_PROMISE_RATING".to_owned()),
        ("ML Skills".to_owned(), "ML_SKILLS_RATING".to_owned()),
        ("Policy".to_owned(), "POLICY_RATING".to_owned()),
    ];

    let scores = extract_multi_axis_scores(text, &keywords);
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[2].name, "Policy");
    assert_eq!(scores[2].score, None);
}

#[test]
fn all_extracted_scores_are_in_bounds() {
    let template = spar_template();
    let keywords = template.axis_ranking_keywords();

    let text = "\
GENERAL_PROMISE_RATING = 5\n\
ML_SKILLS_RATING = 0\n\
SOFTWARE_ENGINEERING_RATING = 9\n\
POLICY_EXPERIENCE_RATING: 2\n\
AI_SAFETY_UNDERSTANDING_RATING - 3\n\
PATH_TO_IMPACT_RATING comes to 4/5\n";

    let scores = extract_multi_axis_scores(text, &keywords);
    assert_eq!(scores.len(), 7);
    for axis in &scores {
        if let Some(score) = axis.score {
            assert!((1..=5).contains(&score), "{}: {score}", axis.name);
        }
    }
    assert_eq!(scores[0].score, Some(5));
    assert_eq!(scores[3].score, Some(2));
    assert_eq!(scores[4].score, Some(3));
    assert_eq!(scores[5].score, Some(4));
}

#[test]
fn extraction_is_deterministic_over_full_template() {
    let template = spar_template();
    let keywords = template.axis_ranking_keywords();
    let text = "General Promise: 4\n\nSoftware Engineering Skills assessment gives 3.\n\nResearch Experience = 2";

    let first = extract_multi_axis_scores(text, &keywords);
    for _ in 0..5 {
        assert_eq!(extract_multi_axis_scores(text, &keywords), first);
    }
}

#[test]
fn single_axis_uses_ranking_keyword() {
    let text = "Reasoning...\n\nFINAL_RANKING = 3";
    assert_eq!(extract_score(text, "FINAL_RANKING"), Some(3));
    assert_eq!(extract_score(text, "OTHER_KEYWORD"), None);
}
