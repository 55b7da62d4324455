//! Scenario generation and the question loop against a scripted oracle.

use std::sync::Arc;

use agent_architect::simulation::runner::{
    RunnerModels, SimulationRunner, ANSWER_FAILED_RATIONALE, EMPTY_ANSWER,
    EVALUATION_FAILED_RATIONALE, MISSING_RATIONALE,
};
use agent_architect::simulation::{
    Question, RunPhase, SimulationError, Verdict, DEFAULT_CATEGORIES,
};

use crate::fake_oracle::{prompt_text, Reply, ScriptedOracle};

fn runner(oracle: &Arc<ScriptedOracle>) -> SimulationRunner {
    SimulationRunner::new(
        oracle.clone(),
        RunnerModels {
            scenarios: "scenario-model".to_owned(),
            answer: "answer-model".to_owned(),
            evaluate: "eval-model".to_owned(),
        },
        10,
    )
}

fn question(id: &str, text: &str) -> Question {
    Question {
        id: id.to_owned(),
        category: "Compliance".to_owned(),
        text: text.to_owned(),
        success_criteria: "Mentions ISO 9001".to_owned(),
        position: 0,
    }
}

fn eval(status: &str, rationale: &str) -> Reply {
    Reply::Text(format!(
        r#"{{"status": "{status}", "rationale": "{rationale}"}}"#
    ))
}

#[tokio::test]
async fn scenarios_use_schema_and_truncated_instructions() {
    let oracle = Arc::new(ScriptedOracle::texts(&[r#"```json
[
  {"category": "Industry Basics", "text": "What do you sell?", "successCriteria": "Names the product"},
  {"category": "Angry Customer", "text": "This is broken!"}
]
```"#]));
    let questions = match runner(&oracle)
        .generate_scenarios("You are the ACME support agent.", &DEFAULT_CATEGORIES)
        .await
    {
        Ok(questions) => questions,
        Err(err) => panic!("scenarios should generate: {err}"),
    };

    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].category, "Industry Basics");
    assert!(questions[0].id.starts_with("q-"));

    let requests = oracle.requests();
    assert_eq!(requests[0].model, "scenario-model");
    assert!(requests[0].response_schema.is_some());
    let prompt = prompt_text(&requests[0]);
    assert!(prompt.contains("\"You are th...\""));
    assert!(prompt.contains("Generate 4 distinct"));
    assert!(prompt.contains("Prompt Hacking"));
}

#[tokio::test]
async fn scenario_oracle_failure_is_an_error() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Reply::Fail("quota".to_owned())]));
    let result = runner(&oracle).generate_scenarios("x", &["Compliance"]).await;
    assert!(matches!(result, Err(SimulationError::Scenarios(_))));
}

#[tokio::test]
async fn empty_question_list_is_rejected_without_calls() {
    let oracle = Arc::new(ScriptedOracle::default());
    let result = runner(&oracle).run("agent-1", "prompt", &[], |_| {}).await;
    assert!(matches!(result, Err(SimulationError::NoScenarios)));
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn answer_failure_is_failure_and_run_continues() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        Reply::Fail("rate limited".to_owned()),
        Reply::Text("We hold ISO 9001.".to_owned()),
        eval("SUCCESS", "Cites the certificate."),
    ]));
    let questions = [question("q1", "Certified?"), question("q2", "Which standard?")];

    let run = match runner(&oracle)
        .run("agent-1", "Be precise.", &questions, |_| {})
        .await
    {
        Ok(run) => run,
        Err(err) => panic!("run should complete: {err}"),
    };

    assert_eq!(run.agent_id, "agent-1");
    assert_eq!(run.results.len(), 2);
    assert_eq!(run.results[0].verdict, Verdict::Failure);
    assert_eq!(run.results[0].rationale, ANSWER_FAILED_RATIONALE);
    assert!(run.results[0].agent_response.starts_with("API ERROR:"));
    assert_eq!(run.results[1].verdict, Verdict::Success);
    assert_eq!(run.results[1].question_id, "q2");
    assert_eq!(run.summary.score, 50);
    assert_eq!(run.summary.failure, 1);

    // one failed answer, then answer + evaluation for q2
    assert_eq!(oracle.calls(), 3);
    let answer_request = &oracle.requests()[1];
    assert_eq!(answer_request.model, "answer-model");
    assert_eq!(answer_request.system.as_deref(), Some("Be precise."));
}

#[tokio::test]
async fn evaluation_failure_is_warning_and_keeps_answer() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        Reply::Text("We hold ISO 9001.".to_owned()),
        Reply::Fail("timeout".to_owned()),
    ]));
    let result = runner(&oracle)
        .run_question("prompt", &question("q1", "Certified?"))
        .await;

    assert_eq!(result.verdict, Verdict::Warning);
    assert_eq!(result.rationale, EVALUATION_FAILED_RATIONALE);
    assert_eq!(result.agent_response, "We hold ISO 9001.");
}

#[tokio::test]
async fn unparseable_evaluation_is_warning() {
    let oracle = Arc::new(ScriptedOracle::texts(&["answer", "looks fine to me"]));
    let result = runner(&oracle)
        .run_question("prompt", &question("q1", "Hi"))
        .await;
    assert_eq!(result.verdict, Verdict::Warning);
    assert_eq!(result.rationale, EVALUATION_FAILED_RATIONALE);
}

#[tokio::test]
async fn unknown_status_and_missing_rationale() {
    let oracle = Arc::new(ScriptedOracle::texts(&["answer", r#"{"status": "PASSED"}"#]));
    let result = runner(&oracle)
        .run_question("prompt", &question("q1", "Hi"))
        .await;
    assert_eq!(result.verdict, Verdict::Warning);
    assert_eq!(result.rationale, MISSING_RATIONALE);
}

#[tokio::test]
async fn empty_answer_is_recorded_and_graded() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        Reply::Text("   ".to_owned()),
        eval("FAILURE", "No answer given."),
    ]));
    let result = runner(&oracle)
        .run_question("prompt", &question("q1", "Hi"))
        .await;

    assert_eq!(result.agent_response, EMPTY_ANSWER);
    assert_eq!(result.verdict, Verdict::Failure);
    let eval_prompt = prompt_text(&oracle.requests()[1]);
    assert!(eval_prompt.contains(EMPTY_ANSWER));
    assert!(eval_prompt.contains("Mentions ISO 9001"));
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_completed() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        Reply::Text("a".to_owned()),
        eval("SUCCESS", "ok"),
        Reply::Text("b".to_owned()),
        eval("WARNING", "partial"),
        Reply::Text("c".to_owned()),
        eval("SUCCESS", "ok"),
    ]));
    let questions = [
        question("q1", "one"),
        question("q2", "two"),
        question("q3", "three"),
    ];
    let mut seen = Vec::new();

    let run = match runner(&oracle)
        .run("agent-1", "prompt", &questions, |phase| seen.push(phase))
        .await
    {
        Ok(run) => run,
        Err(err) => panic!("run should complete: {err}"),
    };

    let percents: Vec<u8> = seen.iter().map(RunPhase::progress).collect();
    assert_eq!(percents, vec![0, 33, 67, 100, 100]);
    assert_eq!(seen.last(), Some(&RunPhase::Completed));
    assert_eq!(run.summary.total, 3);
    assert_eq!(run.summary.success, 2);
    assert_eq!(run.summary.warning, 1);
    assert_eq!(run.summary.score, 67);
    let order: Vec<_> = run.results.iter().map(|r| r.question_id.as_str()).collect();
    assert_eq!(order, ["q1", "q2", "q3"]);
}
