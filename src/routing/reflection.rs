//! Agentic reflection loop: plan, execute, critique, retry.
//!
//! Wraps the semantic router in a bounded self-correction cycle. The goal is
//! extracted once from the original query; each attempt plans and executes,
//! then a reflection prompt judges the result against the goal and may ask
//! for a retry with an LLM-improved query, up to the attempt budget.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::Result;

use super::{parse_json_reply, MultiStepPlan, SemanticRouter};

/// Default retry budget for the reflection loop.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const GOAL_EXTRACTION_PROMPT: &str = r#"Extract the goal and success criteria from the user query.

Identify:
1. The main goal/objective
2. Specific success criteria (what would make this successful)
3. Any constraints or limitations mentioned

Format as JSON with:
- description: main goal
- success_criteria: list of criteria
- constraints: list of constraints"#;

const REFLECTION_PROMPT: &str = r#"Analyze the execution result against the original goal.

Consider:
1. Was the goal achieved?
2. What aspects are missing or incomplete?
3. How good is the quality of the result?
4. What improvements could be made?
5. Should we retry with a different approach?

Format as JSON with:
- goal_achieved: boolean
- missing_aspects: list of what's missing
- quality_assessment: brief assessment
- suggested_improvements: list of improvements
- needs_retry: boolean
- retry_strategy: strategy if retry needed"#;

const IMPROVEMENT_PROMPT: &str = "You are an AI that improves queries based on reflection feedback.";

/// The goal of a task, extracted from the user's query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGoal {
    /// Goal description.
    pub description: String,
    /// Criteria for successful completion.
    #[serde(default)]
    pub success_criteria: Vec<String>,
    /// Constraints or limitations.
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// Result of executing a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// `success`, `partial`, or `failed`.
    pub status: String,
    /// Aggregated result data.
    pub data: Value,
    /// Number of steps that completed.
    pub steps_completed: usize,
    /// Total number of steps.
    pub total_steps: usize,
    /// Errors reported along the way.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Analysis produced by the reflection phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionAnalysis {
    /// Whether the goal was achieved.
    pub goal_achieved: bool,
    /// What's missing from the result.
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    /// Assessment of result quality.
    #[serde(default)]
    pub quality_assessment: String,
    /// Suggested improvements or next steps.
    #[serde(default)]
    pub suggested_improvements: Vec<String>,
    /// Whether to retry with improvements.
    #[serde(default)]
    pub needs_retry: bool,
    /// Strategy for the retry, when one is needed.
    #[serde(default)]
    pub retry_strategy: Option<String>,
}

/// Framework for planning, executing and reflecting on complex queries.
pub struct AgenticFramework {
    router: Arc<SemanticRouter>,
    max_retries: u32,
}

impl std::fmt::Debug for AgenticFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgenticFramework")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl AgenticFramework {
    /// Create a framework with the default retry budget.
    pub fn new(router: Arc<SemanticRouter>) -> Self {
        Self {
            router,
            max_retries: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Extract the goal from a user query, falling back to the raw query
    /// when the LLM reply cannot be parsed.
    pub async fn extract_goal(&self, query: &str) -> TaskGoal {
        info!(query, "extracting goal from query");

        let fallback = TaskGoal {
            description: query.to_owned(),
            success_criteria: vec!["Complete the requested task".to_owned()],
            constraints: vec![],
        };

        let content = match self.router.complete_text(GOAL_EXTRACTION_PROMPT, query).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "failed to extract goal");
                return fallback;
            }
        };

        match parse_json_reply(&content) {
            Ok(data) => TaskGoal {
                description: data
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or(query)
                    .to_owned(),
                success_criteria: string_list(&data, "success_criteria"),
                constraints: string_list(&data, "constraints"),
            },
            Err(reason) => {
                warn!(reason, "failed to parse goal extraction");
                fallback
            }
        }
    }

    /// Create an execution plan: multi-step when the complexity analysis
    /// says so, a single routing decision otherwise.
    ///
    /// # Errors
    ///
    /// Propagates routing and planning failures.
    pub async fn plan(&self, query: &str) -> Result<Value> {
        let (is_complex, reasoning) = self.router.analyze_complexity(query).await;

        if is_complex {
            let plan = self.router.plan_multi_step(query).await?;
            Ok(json!({
                "type": "multi_step",
                "plan": plan,
                "complexity_reasoning": reasoning,
            }))
        } else {
            let routing = self.router.route(query).await?;
            Ok(json!({
                "type": "single_step",
                "routing": routing,
                "complexity_reasoning": reasoning,
            }))
        }
    }

    /// Execute a plan produced by [`AgenticFramework::plan`].
    ///
    /// Failures are folded into the returned result rather than propagated,
    /// so the reflection phase can judge them.
    pub async fn execute(&self, query: &str, plan: &Value) -> ExecutionResult {
        let plan_type = plan.get("type").and_then(Value::as_str).unwrap_or_default();
        info!(plan_type, "executing plan");

        if plan_type == "multi_step" {
            let parsed: Option<MultiStepPlan> = plan
                .get("plan")
                .cloned()
                .and_then(|p| serde_json::from_value(p).ok());
            let total_steps = parsed.as_ref().map(|p| p.steps.len()).unwrap_or(0);

            match self.router.execute_multi_step(query, parsed).await {
                Ok(responses) => {
                    let all_ok = responses.iter().all(|r| r.is_success());
                    let data: Vec<Value> = responses
                        .iter()
                        .filter(|r| r.is_success())
                        .filter_map(|r| r.data.clone())
                        .collect();
                    let errors: Vec<String> =
                        responses.iter().filter_map(|r| r.error.clone()).collect();
                    ExecutionResult {
                        status: if all_ok { "success" } else { "partial" }.to_owned(),
                        data: Value::Array(data),
                        steps_completed: responses.len(),
                        total_steps,
                        errors,
                    }
                }
                Err(e) => ExecutionResult {
                    status: "failed".to_owned(),
                    data: Value::Null,
                    steps_completed: 0,
                    total_steps,
                    errors: vec![e.to_string()],
                },
            }
        } else {
            let routing = plan
                .get("routing")
                .cloned()
                .and_then(|r| serde_json::from_value(r).ok());

            match self.router.execute_single(query, routing).await {
                Ok(response) => ExecutionResult {
                    status: if response.is_success() {
                        "success"
                    } else {
                        "failed"
                    }
                    .to_owned(),
                    data: response.data.clone().unwrap_or(Value::Null),
                    steps_completed: 1,
                    total_steps: 1,
                    errors: response.error.into_iter().collect(),
                },
                Err(e) => ExecutionResult {
                    status: "failed".to_owned(),
                    data: Value::Null,
                    steps_completed: 0,
                    total_steps: 1,
                    errors: vec![e.to_string()],
                },
            }
        }
    }

    /// Judge an execution result against the goal.
    ///
    /// Falls back to a status-based analysis when the LLM call or its reply
    /// fails.
    pub async fn reflect(&self, goal: &TaskGoal, result: &ExecutionResult) -> ReflectionAnalysis {
        info!(status = %result.status, "reflecting on execution");

        let fallback = ReflectionAnalysis {
            goal_achieved: result.status == "success",
            missing_aspects: vec![],
            quality_assessment: "Unable to analyze".to_owned(),
            suggested_improvements: vec![],
            needs_retry: false,
            retry_strategy: None,
        };

        let result_summary = json!({
            "status": result.status,
            "data": result.data,
            "errors": result.errors,
            "completion": format!("{}/{}", result.steps_completed, result.total_steps),
        });
        let user = format!(
            "Goal: {}\nSuccess Criteria: {}\nResult: {}",
            goal.description,
            goal.success_criteria.join("\n"),
            serde_json::to_string_pretty(&result_summary).unwrap_or_default()
        );

        let content = match self.router.complete_text(REFLECTION_PROMPT, &user).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "failed to reflect on result");
                return fallback;
            }
        };

        match parse_json_reply(&content) {
            Ok(data) => ReflectionAnalysis {
                goal_achieved: data
                    .get("goal_achieved")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                missing_aspects: string_list(&data, "missing_aspects"),
                quality_assessment: data
                    .get("quality_assessment")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                suggested_improvements: string_list(&data, "suggested_improvements"),
                needs_retry: data
                    .get("needs_retry")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                retry_strategy: data
                    .get("retry_strategy")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
            },
            Err(reason) => {
                warn!(reason, "failed to parse reflection");
                ReflectionAnalysis {
                    quality_assessment: "Unable to parse detailed reflection".to_owned(),
                    ..fallback
                }
            }
        }
    }

    /// Ask the LLM for an improved query. Falls back to the original.
    async fn improve_query(
        &self,
        original_query: &str,
        retry_strategy: &str,
        improvements: &[String],
    ) -> String {
        let user = format!(
            "Original query: {original_query}\nStrategy: {retry_strategy}\nImprovements: {}\n\nGenerate an improved query.",
            improvements.join(", ")
        );

        match self.router.complete_text(IMPROVEMENT_PROMPT, &user).await {
            Ok(improved) => improved.trim().to_owned(),
            Err(e) => {
                warn!(error = %e, "failed to improve query");
                original_query.to_owned()
            }
        }
    }

    /// Process a query with the full reflection loop.
    ///
    /// Extracts the goal once, then iterates plan → execute → reflect until
    /// the goal is achieved, retry is not indicated, or the attempt budget
    /// (default 3) is spent. Returns the attempt trail plus the final result
    /// and reflection.
    ///
    /// # Errors
    ///
    /// Propagates planning failures; execution failures are folded into the
    /// attempt results.
    pub async fn process_with_reflection(
        &self,
        query: &str,
        max_attempts: Option<u32>,
    ) -> Result<Value> {
        let max_attempts = max_attempts.unwrap_or(self.max_retries).max(1);

        let goal = self.extract_goal(query).await;

        let mut attempts: Vec<Value> = Vec::new();
        let mut current_query = query.to_owned();

        for attempt in 1..=max_attempts {
            info!(attempt, max_attempts, "processing attempt");

            let plan = self.plan(&current_query).await?;
            let result = self.execute(&current_query, &plan).await;
            let analysis = self.reflect(&goal, &result).await;

            attempts.push(json!({
                "attempt": attempt,
                "query": current_query.clone(),
                "plan": plan,
                "result": result,
                "reflection": &analysis,
            }));

            if analysis.goal_achieved || !analysis.needs_retry {
                break;
            }

            if attempt < max_attempts {
                current_query = self
                    .improve_query(
                        query,
                        analysis.retry_strategy.as_deref().unwrap_or_default(),
                        &analysis.suggested_improvements,
                    )
                    .await;
                info!(new_query = %current_query, "retrying with improved query");
            }
        }

        let last = attempts.last().cloned().unwrap_or(Value::Null);
        Ok(json!({
            "goal": goal,
            "attempts": attempts.len(),
            "result": last.get("result").cloned().unwrap_or(Value::Null),
            "reflection": last.get("reflection").cloned().unwrap_or(Value::Null),
            "history": attempts,
        }))
    }
}

fn string_list(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
