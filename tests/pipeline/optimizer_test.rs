//! Instruction rewrites from failed results.

use std::sync::Arc;

use agent_architect::optimizer::{apply, PromptOptimizer, DEFAULT_IMPROVE_INSTRUCTION};
use agent_architect::simulation::{TestResult, Verdict};

use crate::fake_oracle::{prompt_text, ScriptedOracle};

fn result(n: usize, verdict: Verdict) -> TestResult {
    TestResult {
        id: format!("r{n}"),
        question_id: format!("q{n}"),
        question_text: format!("question {n}"),
        agent_response: format!("answer {n}"),
        verdict,
        rationale: format!("problem {n}"),
        timestamp: 0,
    }
}

#[test]
fn request_quotes_only_first_non_successes() {
    let optimizer = PromptOptimizer::new(Arc::new(ScriptedOracle::default()), "pro", 5);
    let mut results = vec![result(0, Verdict::Success)];
    results.extend((1..=7).map(|n| result(n, Verdict::Failure)));
    results.push(result(8, Verdict::Warning));

    let prompt = prompt_text(&optimizer.build_request("You are Acme.", &results, None));
    assert!(prompt.contains("ORIGINAL SYSTEM PROMPT: You are Acme."));
    assert!(!prompt.contains("question 0"));
    assert!(prompt.contains("question 1"));
    assert!(prompt.contains("question 5"));
    assert!(!prompt.contains("question 6"));
    assert_eq!(prompt.matches("FAILED SCENARIO:").count(), 5);
    assert!(prompt.contains(DEFAULT_IMPROVE_INSTRUCTION));
}

#[test]
fn custom_instruction_replaces_default() {
    let optimizer = PromptOptimizer::new(Arc::new(ScriptedOracle::default()), "pro", 5);
    let results = [result(1, Verdict::Warning)];
    let prompt = prompt_text(&optimizer.build_request("p", &results, Some(" Be stricter ")));
    assert!(prompt.contains("INSTRUCTION: \"Be stricter\""));
    assert!(!prompt.contains(DEFAULT_IMPROVE_INSTRUCTION));
}

#[tokio::test]
async fn empty_rewrite_keeps_current_prompt() {
    let oracle = Arc::new(ScriptedOracle::texts(&["  "]));
    let optimizer = PromptOptimizer::new(oracle, "pro", 5);
    let rewritten = optimizer
        .improve("You are Acme.", &[result(1, Verdict::Failure)], None)
        .await;
    assert!(matches!(rewritten, Ok(text) if text == "You are Acme."));
}

#[tokio::test]
async fn rewrite_is_applied_to_a_copy() {
    let oracle = Arc::new(ScriptedOracle::texts(&["```\nYou are Acme v2.\n```"]));
    let optimizer = PromptOptimizer::new(oracle, "pro", 5);
    let rewritten = match optimizer
        .improve("You are Acme.", &[result(1, Verdict::Failure)], None)
        .await
    {
        Ok(text) => text,
        Err(err) => panic!("improve should succeed: {err}"),
    };
    assert_eq!(rewritten, "You are Acme v2.");

    let agent = crate::architect_test::sample_agent("a1", "You are Acme.");
    let updated = apply(&agent, rewritten);
    assert_eq!(updated.id, agent.id);
    assert_eq!(updated.created_at, agent.created_at);
    assert_eq!(updated.system_prompt, "You are Acme v2.");
}
