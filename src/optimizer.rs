//! Instruction rewrites driven by failed test results.

use std::sync::Arc;

use tracing::info;

use crate::agent::Agent;
use crate::providers::{strip_code_fences, OracleError, OracleRequest, TextOracle};
use crate::simulation::{TestResult, Verdict};

/// Instruction used when the user gives none.
pub const DEFAULT_IMPROVE_INSTRUCTION: &str = "Fix the logic to prevent these errors.";

/// Rewrites an agent's instructions from its failures.
#[derive(Clone)]
pub struct PromptOptimizer {
    oracle: Arc<dyn TextOracle>,
    model: String,
    max_failures: usize,
}

impl PromptOptimizer {
    /// Create an optimizer quoting at most `max_failures` failures per call.
    pub fn new(oracle: Arc<dyn TextOracle>, model: impl Into<String>, max_failures: usize) -> Self {
        Self {
            oracle,
            model: model.into(),
            max_failures,
        }
    }

    /// The request for a rewrite. Successful results are skipped.
    pub fn build_request(
        &self,
        current: &str,
        results: &[TestResult],
        instruction: Option<&str>,
    ) -> OracleRequest {
        let failures = results
            .iter()
            .filter(|r| r.verdict != Verdict::Success)
            .take(self.max_failures)
            .map(|r| {
                format!(
                    "FAILED SCENARIO:\n- User: {}\n- AI Said: {}\n- Problem: {}",
                    r.question_text, r.agent_response, r.rationale
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let instruction = instruction
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_IMPROVE_INSTRUCTION);

        let prompt = format!(
            "You are a Senior Prompt Engineer.\n\
             ORIGINAL SYSTEM PROMPT: {current}\n\
             TEST FAILURES: {failures}\n\
             INSTRUCTION: \"{instruction}\"\n\
             TASK: Rewrite the System Prompt to fix failures while keeping original intent. \
             Return ONLY the new system prompt."
        );
        OracleRequest::text(self.model.clone(), prompt)
    }

    /// Rewrite `current`. An empty answer keeps `current`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if the oracle call fails.
    pub async fn improve(
        &self,
        current: &str,
        results: &[TestResult],
        instruction: Option<&str>,
    ) -> Result<String, OracleError> {
        let response = self
            .oracle
            .generate(self.build_request(current, results, instruction))
            .await?;
        let rewritten = strip_code_fences(&response.text);
        if rewritten.is_empty() {
            info!("optimizer returned nothing, keeping current instructions");
            return Ok(current.to_owned());
        }
        Ok(rewritten)
    }
}

/// A copy of `agent` carrying the new instructions, ready for
/// `agents().update`.
pub fn apply(agent: &Agent, instructions: String) -> Agent {
    Agent {
        system_prompt: instructions,
        ..agent.clone()
    }
}
