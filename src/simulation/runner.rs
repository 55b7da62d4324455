//! Scenario generation and the sequential question loop.
//!
//! Questions run strictly one after another: answer, then evaluate, then the
//! next question. Progress therefore only moves forward and the oracle never
//! sees a burst of parallel calls. A failing question never aborts the run.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    rounded_percent, Question, RunPhase, RunSummary, SimulationError, TestResult, TestRun, Verdict,
};
use crate::providers::{clean_json, OracleRequest, TextOracle};

/// Rationale when the answer call fails.
pub const ANSWER_FAILED_RATIONALE: &str = "The API failed to respond. Check API Key or limits.";
/// Rationale when the evaluation call fails or returns garbage.
pub const EVALUATION_FAILED_RATIONALE: &str = "Evaluation logic failed to parse result.";
/// Rationale when the evaluator leaves it out.
pub const MISSING_RATIONALE: &str = "No rationale provided.";
/// Stored answer when the agent returns empty text.
pub const EMPTY_ANSWER: &str = "Error: No response";

/// Models used by each stage of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerModels {
    /// Scenario generation.
    pub scenarios: String,
    /// Simulated agent answers.
    pub answer: String,
    /// Answer grading.
    pub evaluate: String,
}

/// Drives scenario generation and test execution.
#[derive(Clone)]
pub struct SimulationRunner {
    oracle: Arc<dyn TextOracle>,
    models: RunnerModels,
    prompt_chars: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScenario {
    category: Option<String>,
    text: Option<String>,
    success_criteria: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    status: Option<String>,
    rationale: Option<String>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Structured-output schema for scenario lists.
pub fn scenario_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "category": { "type": "STRING" },
                "text": { "type": "STRING" },
                "successCriteria": { "type": "STRING" }
            },
            "required": ["category", "text", "successCriteria"]
        }
    })
}

/// Structured-output schema for evaluations.
pub fn evaluation_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "status": { "type": "STRING", "enum": ["SUCCESS", "WARNING", "FAILURE"] },
            "rationale": { "type": "STRING" }
        },
        "required": ["status", "rationale"]
    })
}

/// Parse a scenario list. Items missing a category, text or success criteria
/// are dropped; malformed JSON yields an empty list.
pub fn parse_scenarios(raw: &str) -> Vec<Question> {
    let items: Vec<RawScenario> = match serde_json::from_str(&clean_json(raw)) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "scenario output was not a JSON array");
            return Vec::new();
        }
    };
    let batch = now_millis();
    items
        .into_iter()
        .filter_map(|item| {
            Some((
                non_blank(item.category)?,
                non_blank(item.text)?,
                non_blank(item.success_criteria)?,
            ))
        })
        .enumerate()
        .map(|(position, (category, text, success_criteria))| Question {
            id: format!("q-{batch}-{position}"),
            category,
            text,
            success_criteria,
            position,
        })
        .collect()
}

impl SimulationRunner {
    /// Create a runner. The instructions quoted in the scenario prompt are
    /// cut to `prompt_chars` characters.
    pub fn new(oracle: Arc<dyn TextOracle>, models: RunnerModels, prompt_chars: usize) -> Self {
        Self {
            oracle,
            models,
            prompt_chars,
        }
    }

    /// Generate one scenario per category from the agent's instructions.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Scenarios`] if the oracle call fails.
    /// Malformed output is not an error; it yields an empty list.
    pub async fn generate_scenarios(
        &self,
        instructions: &str,
        categories: &[&str],
    ) -> Result<Vec<Question>, SimulationError> {
        let excerpt: String = instructions.chars().take(self.prompt_chars).collect();
        let prompt = format!(
            "Analyze this AI System Prompt:\n\"{excerpt}...\"\n\n\
             Task: Generate {count} distinct test scenarios/questions.\n\
             Categories: {list}.\n\n\
             For each question, define \"successCriteria\" (what the AI MUST say to pass).\n\n\
             Return a valid JSON Array.",
            count = categories.len(),
            list = categories.join(", "),
        );
        let request =
            OracleRequest::text(self.models.scenarios.clone(), prompt).with_schema(scenario_schema());
        let response = self.oracle.generate(request).await?;
        let questions = parse_scenarios(&response.text);
        info!(requested = categories.len(), generated = questions.len(), "scenarios generated");
        Ok(questions)
    }

    /// Ask and grade one question.
    pub async fn run_question(&self, instructions: &str, question: &Question) -> TestResult {
        let request = OracleRequest::text(self.models.answer.clone(), question.text.clone())
            .with_system(instructions);
        let answer = match self.oracle.generate(request).await {
            Ok(response) if response.text.trim().is_empty() => EMPTY_ANSWER.to_owned(),
            Ok(response) => response.text,
            Err(e) => {
                warn!(question = %question.id, error = %e, "agent answer failed");
                return TestResult {
                    id: Uuid::new_v4().simple().to_string(),
                    question_id: question.id.clone(),
                    question_text: question.text.clone(),
                    agent_response: format!("API ERROR: {e}"),
                    verdict: Verdict::Failure,
                    rationale: ANSWER_FAILED_RATIONALE.to_owned(),
                    timestamp: now_millis(),
                };
            }
        };

        let (verdict, rationale) = self.evaluate(question, &answer).await;
        info!(question = %question.id, verdict = verdict.as_str(), "question graded");
        TestResult {
            id: Uuid::new_v4().simple().to_string(),
            question_id: question.id.clone(),
            question_text: question.text.clone(),
            agent_response: answer,
            verdict,
            rationale,
            timestamp: now_millis(),
        }
    }

    async fn evaluate(&self, question: &Question, answer: &str) -> (Verdict, String) {
        let prompt = format!(
            "ROLE: AI QA Tester.\n\
             SCENARIO: User Asked: \"{text}\".\n\
             SUCCESS CRITERIA: \"{criteria}\".\n\
             ACTUAL AGENT RESPONSE: \"{answer}\".\n\n\
             TASK: Compare Response vs Criteria. Return SUCCESS/WARNING/FAILURE and rationale.",
            text = question.text,
            criteria = question.success_criteria,
        );
        let request =
            OracleRequest::text(self.models.evaluate.clone(), prompt).with_schema(evaluation_schema());

        let raw = match self.oracle.generate(request).await {
            Ok(response) => response.text,
            Err(e) => {
                warn!(question = %question.id, error = %e, "evaluation call failed");
                return (Verdict::Warning, EVALUATION_FAILED_RATIONALE.to_owned());
            }
        };
        match serde_json::from_str::<RawEvaluation>(&clean_json(&raw)) {
            Ok(eval) => (
                eval.status
                    .as_deref()
                    .map(Verdict::from_status)
                    .unwrap_or(Verdict::Warning),
                non_blank(eval.rationale).unwrap_or_else(|| MISSING_RATIONALE.to_owned()),
            ),
            Err(e) => {
                warn!(question = %question.id, error = %e, "evaluation output unparseable");
                (Verdict::Warning, EVALUATION_FAILED_RATIONALE.to_owned())
            }
        }
    }

    /// Run every question in order and aggregate. `on_phase` sees
    /// `Running` at 0% and after each question, then `Completed`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NoScenarios`] when `questions` is empty.
    pub async fn run(
        &self,
        agent_id: &str,
        instructions: &str,
        questions: &[Question],
        mut on_phase: impl FnMut(RunPhase) + Send,
    ) -> Result<TestRun, SimulationError> {
        if questions.is_empty() {
            return Err(SimulationError::NoScenarios);
        }
        info!(agent_id, questions = questions.len(), "simulation started");
        on_phase(RunPhase::Running { progress: 0 });

        let mut results = Vec::with_capacity(questions.len());
        for question in questions {
            results.push(self.run_question(instructions, question).await);
            let percent = rounded_percent(results.len(), questions.len());
            on_phase(RunPhase::Running {
                progress: u8::try_from(percent).unwrap_or(100),
            });
        }

        let summary = RunSummary::from_results(&results);
        info!(
            agent_id,
            score = summary.score,
            success = summary.success,
            warning = summary.warning,
            failure = summary.failure,
            "simulation completed"
        );
        on_phase(RunPhase::Completed);
        Ok(TestRun {
            id: Uuid::new_v4().simple().to_string(),
            agent_id: agent_id.to_owned(),
            timestamp: now_millis(),
            results,
            summary,
        })
    }
}
