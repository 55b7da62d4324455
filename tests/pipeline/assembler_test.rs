//! Instruction assembly.

use std::sync::Arc;

use agent_architect::agent::IdentityFields;
use agent_architect::assembler::{AssembleError, PromptAssembler, EMPTY_ASSEMBLY};
use agent_architect::knowledge::compiler::CompiledKnowledge;

use crate::fake_oracle::{prompt_text, Reply, ScriptedOracle};

fn identity(name: &str, tone: &str) -> IdentityFields {
    IdentityFields {
        name: name.to_owned(),
        website: None,
        description: "Support desk for timber orders".to_owned(),
        flow: "Greet, qualify, answer".to_owned(),
        tone: tone.to_owned(),
    }
}

fn knowledge() -> CompiledKnowledge {
    let mut knowledge = CompiledKnowledge::new();
    knowledge.append_text("Opening hours 9-17.");
    if let Err(err) = knowledge.append_block("src1", "catalog.pdf", "- Oak planks") {
        panic!("block should append: {err}");
    }
    knowledge
}

#[tokio::test]
async fn blank_name_fails_without_oracle_call() {
    let oracle = Arc::new(ScriptedOracle::texts(&["unused"]));
    let assembler = PromptAssembler::new(oracle.clone(), "m");
    let result = assembler
        .assemble(&identity("  ", "Formal"), "", &CompiledKnowledge::new(), false)
        .await;
    assert!(matches!(result, Err(AssembleError::MissingName)));
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn output_fences_are_stripped() {
    let oracle = Arc::new(ScriptedOracle::texts(&["```markdown\n[ROLE]\nYou are Acme.\n```"]));
    let assembler = PromptAssembler::new(oracle.clone(), "m");
    let result = assembler
        .assemble(&identity("Acme", "Formal"), "Never quote prices.", &knowledge(), false)
        .await;
    assert!(matches!(result, Ok(text) if text == "[ROLE]\nYou are Acme."));

    let prompt = prompt_text(&oracle.requests()[0]);
    assert!(prompt.contains("- Name: Acme"));
    assert!(prompt.contains("- Website: Not provided"));
    assert!(prompt.contains("- Rules: Never quote prices."));
    assert!(prompt.contains("<<<<BLOCK_START:src1>>>>"));
    assert!(!prompt.contains("SECTOR INTELLIGENCE"));
}

#[tokio::test]
async fn empty_output_yields_fixed_text() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Reply::Text(String::new())]));
    let assembler = PromptAssembler::new(oracle, "m");
    let result = assembler
        .assemble(&identity("Acme", "Formal"), "", &CompiledKnowledge::new(), false)
        .await;
    assert!(matches!(result, Ok(text) if text == EMPTY_ASSEMBLY));
}

#[tokio::test]
async fn oracle_failure_is_reported() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Reply::Fail("quota".to_owned())]));
    let assembler = PromptAssembler::new(oracle, "m");
    let result = assembler
        .assemble(&identity("Acme", "Formal"), "", &CompiledKnowledge::new(), false)
        .await;
    assert!(matches!(result, Err(AssembleError::Oracle(_))));
}

#[test]
fn sector_and_auto_match_shape_the_prompt() {
    let assembler = PromptAssembler::new(Arc::new(ScriptedOracle::default()), "m");
    let mut id = identity("Acme", "[AUTO-MATCH] Warm");
    id.website = Some("https://acme.example".to_owned());

    let request = assembler.build_request(&id, "", &knowledge(), true);
    let prompt = prompt_text(&request);
    assert!(prompt.contains("[CONTEXTUAL AWARENESS & SECTOR INTELLIGENCE]"));
    assert!(prompt.contains("- Tone/Language: Style: Warm."));
    assert!(prompt.contains("- Website: https://acme.example"));
    assert_eq!(request.model, "m");
}
