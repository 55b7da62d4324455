//! Test simulation: scenarios, verdicts and run aggregation.
//!
//! [`runner::SimulationRunner`] generates questions from an agent's
//! instructions, asks each one against those instructions and grades the
//! answer with a second oracle call. The result is a [`TestRun`].

pub mod runner;

use serde::{Deserialize, Serialize};

/// Scenario categories offered by default.
pub const DEFAULT_CATEGORIES: [&str; 4] = [
    "Industry Basics",
    "Angry Customer",
    "Prompt Hacking",
    "Compliance",
];

/// Simulation errors.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The scenario oracle call failed.
    #[error("scenario generation failed: {0}")]
    Scenarios(#[from] crate::providers::OracleError),
    /// A run needs at least one question.
    #[error("no scenarios to run; generate scenarios first")]
    NoScenarios,
}

/// Grade of one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Meets the success criteria.
    Success,
    /// Partially meets them, or could not be graded.
    Warning,
    /// Misses them, or the agent did not answer.
    Failure,
}

impl Verdict {
    /// Parse an evaluator status. Anything unrecognized is a warning.
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            _ => Self::Warning,
        }
    }

    /// Wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Failure => "FAILURE",
        }
    }
}

/// A generated test scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question id.
    pub id: String,
    /// Category tag.
    pub category: String,
    /// What the simulated user asks.
    pub text: String,
    /// What the answer must contain to pass.
    pub success_criteria: String,
    /// Position in the generated list.
    #[serde(rename = "whenToAsk")]
    pub position: usize,
}

/// One graded question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Result id.
    pub id: String,
    /// Question id.
    pub question_id: String,
    /// Question text at the time of the run.
    pub question_text: String,
    /// The agent's raw answer, or the error text when it failed.
    pub agent_response: String,
    /// Verdict.
    #[serde(rename = "status")]
    pub verdict: Verdict,
    /// Why the evaluator chose the verdict.
    pub rationale: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// Verdict counts and score for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of results.
    pub total: usize,
    /// Successes.
    pub success: usize,
    /// Warnings.
    pub warning: usize,
    /// Failures.
    pub failure: usize,
    /// `round(100 * success / total)`, 0 for an empty run.
    pub score: usize,
}

/// `round(100 * part / whole)` with halves rounded up; 0 when `whole` is 0.
pub fn rounded_percent(part: usize, whole: usize) -> usize {
    let numerator = part
        .checked_mul(200)
        .and_then(|n| n.checked_add(whole));
    let denominator = whole.checked_mul(2);
    match (numerator, denominator) {
        (Some(n), Some(d)) => n.checked_div(d).unwrap_or(0),
        _ => 0,
    }
}

impl RunSummary {
    /// Count verdicts and compute the score.
    pub fn from_results(results: &[TestResult]) -> Self {
        let count = |v: Verdict| results.iter().filter(|r| r.verdict == v).count();
        let success = count(Verdict::Success);
        Self {
            total: results.len(),
            success,
            warning: count(Verdict::Warning),
            failure: count(Verdict::Failure),
            score: rounded_percent(success, results.len()),
        }
    }
}

/// One completed simulation. Never modified after it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    /// Run id.
    pub id: String,
    /// Agent the run belongs to.
    pub agent_id: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    /// Results in question order.
    pub results: Vec<TestResult>,
    /// Derived counts and score.
    pub summary: RunSummary,
}

impl TestRun {
    /// Results that did not pass, in order.
    pub fn non_successes(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.verdict != Verdict::Success)
    }
}

/// Where a simulation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing requested yet.
    Idle,
    /// Scenario oracle call in flight.
    GeneratingScenarios,
    /// Questions available, not started.
    ReadyToRun,
    /// Questions executing; progress in percent.
    Running {
        /// 0..=100.
        progress: u8,
    },
    /// All questions executed.
    Completed,
}

impl RunPhase {
    /// Percent complete: 0 before running, 100 once completed.
    pub fn progress(&self) -> u8 {
        match self {
            Self::Idle | Self::GeneratingScenarios | Self::ReadyToRun => 0,
            Self::Running { progress } => *progress,
            Self::Completed => 100,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::GeneratingScenarios => f.write_str("generating scenarios"),
            Self::ReadyToRun => f.write_str("ready to run"),
            Self::Running { progress } => write!(f, "running ({progress}%)"),
            Self::Completed => f.write_str("completed"),
        }
    }
}
