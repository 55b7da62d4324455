//! Source intake lifecycle tests with a scripted summarizer.

use std::sync::Arc;

use agent_architect::knowledge::extractor::EXTRACTION_FAILED;
use agent_architect::knowledge::intake::SourceIntake;
use agent_architect::knowledge::source::{SourceKind, SourceStatus};
use agent_architect::knowledge::{CandidateSource, SourceCategory};
use agent_architect::summarizer::Summarizer;

use crate::fake_oracle::{prompt_text, Reply, ScriptedOracle};

fn intake_with(oracle: &Arc<ScriptedOracle>) -> SourceIntake {
    SourceIntake::new(Summarizer::new(oracle.clone(), "test-model", 20))
}

fn candidate(title: &str, uri: &str) -> CandidateSource {
    CandidateSource {
        title: title.to_owned(),
        uri: uri.to_owned(),
        category: SourceCategory::RegulationCompliance,
        host: "gov.example".to_owned(),
    }
}

#[tokio::test]
async fn text_file_becomes_ready_block() {
    let oracle = Arc::new(ScriptedOracle::texts(&["  - Opens at 9\n"]));
    let mut intake = intake_with(&oracle);

    let id = intake.ingest_file("hours.txt", b"We open at nine every weekday.").await;

    let source = intake.source(&id).expect("source registered");
    assert_eq!(source.status, SourceStatus::Ready);
    assert_eq!(source.kind, SourceKind::PlainText);
    assert_eq!(source.summary.as_deref(), Some("- Opens at 9"));
    assert!(intake.knowledge().contains_block(&id));

    let requests = oracle.requests();
    assert_eq!(requests.len(), 1);
    let prompt = prompt_text(&requests[0]);
    assert!(prompt.contains("Analyze the attached document/text (hours.txt)"));
    // Content is cut to the configured 20 characters.
    assert!(prompt.contains("DOCUMENT CONTENT:\nWe open at nine ever"));
    assert!(!prompt.contains("weekday"));
}

#[tokio::test]
async fn oracle_failure_marks_error_without_block() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Reply::Fail("quota".to_owned())]));
    let mut intake = intake_with(&oracle);

    let id = intake.ingest_file("faq.pdf", b"%PDF").await;

    let source = intake.source(&id).expect("source registered");
    assert_eq!(source.status, SourceStatus::Error);
    assert_eq!(source.summary.as_deref(), Some(EXTRACTION_FAILED));
    assert!(intake.knowledge().is_empty());
}

#[tokio::test]
async fn batch_isolates_failures() {
    let oracle = Arc::new(ScriptedOracle::texts(&["- first", "- third"]));
    let mut intake = intake_with(&oracle);

    let ids = intake
        .ingest_files(vec![
            ("one.txt".to_owned(), b"one".to_vec()),
            ("broken.docx".to_owned(), b"not a package".to_vec()),
            ("three.txt".to_owned(), b"three".to_vec()),
        ])
        .await;

    let statuses: Vec<SourceStatus> = ids
        .iter()
        .map(|id| intake.source(id).expect("registered").status)
        .collect();
    assert_eq!(
        statuses,
        vec![SourceStatus::Ready, SourceStatus::Error, SourceStatus::Ready]
    );
    // The malformed package never reaches the oracle.
    assert_eq!(oracle.calls(), 2);
    assert_eq!(intake.knowledge().blocks().count(), 2);
}

#[tokio::test]
async fn link_is_ready_immediately() {
    let oracle = Arc::new(ScriptedOracle::default());
    let mut intake = intake_with(&oracle);

    let id = intake.add_link(" https://acme.example/about ").expect("link added");

    let source = intake.source(&id).expect("registered");
    assert_eq!(source.kind, SourceKind::Link);
    assert_eq!(source.status, SourceStatus::Ready);
    let block = intake.knowledge().blocks().next().expect("one block");
    assert_eq!(block.source_name(), Some("https://acme.example/about"));
    assert!(block.text().starts_with("https://acme.example/about\n(Note:"));
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn import_dedupes_against_batch_and_existing() {
    let oracle = Arc::new(ScriptedOracle::default());
    let mut intake = intake_with(&oracle);

    let first = intake.import_candidates(&[
        candidate("Building Act", "https://www.gov.example/act/"),
        candidate("ISO 14001", "https://iso.example/14001"),
        candidate("Building Act mirror", "http://gov.example/act"),
    ]);
    assert_eq!(first.len(), 2);
    let names: Vec<&str> = intake.sources().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Building Act", "ISO 14001"]);
    assert!(intake.has_sector_sources());

    let again = intake.import_candidates(&[candidate("Act again", "gov.example/act#top")]);
    assert!(again.is_empty());

    let source = intake.source(&first[0]).expect("registered");
    assert!(source.id.starts_with("sector-"));
    assert_eq!(source.origin_uri.as_deref(), Some("https://www.gov.example/act/"));
    let summary = source.summary.as_deref().unwrap_or_default();
    assert!(summary.starts_with("Regulation & Compliance • gov.example"));
}

#[tokio::test]
async fn removing_sector_source_keeps_other_content() {
    let oracle = Arc::new(ScriptedOracle::texts(&["- summary"]));
    let mut intake = intake_with(&oracle);
    intake.set_knowledge_text("Manually typed paragraph.");
    let doc = intake.ingest_file("doc.txt", b"body").await;
    let ids = intake.import_candidates(&[candidate("Act", "https://gov.example/act")]);
    let sector = ids.first().expect("imported").clone();

    let before = intake.knowledge().render();
    let removed = intake.remove_source(&sector).expect("removed");
    assert_eq!(removed.kind, SourceKind::SectorReference);

    let after = intake.knowledge().render();
    assert!(after.starts_with("Manually typed paragraph."));
    assert!(intake.knowledge().contains_block(&doc));
    assert!(!intake.knowledge().contains_block(&sector));
    assert!(before.starts_with(&after));
    assert!(intake.remove_source(&sector).is_none());
}

#[tokio::test]
async fn clearing_sector_sources_removes_only_references() {
    let oracle = Arc::new(ScriptedOracle::default());
    let mut intake = intake_with(&oracle);
    let link = intake.add_link("https://acme.example").expect("link");
    intake.import_candidates(&[
        candidate("A", "https://a.example"),
        candidate("B", "https://b.example"),
    ]);

    assert_eq!(intake.clear_sector_sources(), 2);
    assert!(!intake.has_sector_sources());
    assert_eq!(intake.sources().len(), 1);
    assert!(intake.knowledge().contains_block(&link));
    assert_eq!(intake.knowledge().blocks().count(), 1);
}

#[tokio::test]
async fn resumed_buffer_restores_sources_for_saved_blocks() {
    let oracle = Arc::new(ScriptedOracle::texts(&["- hours"]));
    let mut intake = intake_with(&oracle);
    let doc = intake.ingest_file("hours.txt", b"nine to five").await;
    let link = intake.add_link("https://acme.example").expect("link");
    let sector = intake.import_candidates(&[candidate("Building Act", "https://gov.example/act")]);
    let saved = intake.into_knowledge();

    let mut resumed = SourceIntake::with_knowledge(
        Summarizer::new(oracle.clone(), "test-model", 20),
        saved,
    );
    assert_eq!(resumed.sources().len(), 3);
    assert!(resumed.has_sector_sources());
    assert_eq!(resumed.imported_origin_uris(), vec!["https://gov.example/act"]);
    let kinds: Vec<SourceKind> = resumed.sources().iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![SourceKind::PlainText, SourceKind::Link, SourceKind::SectorReference]
    );
    assert!(resumed
        .sources()
        .iter()
        .all(|s| s.status == SourceStatus::Ready));
    assert_eq!(resumed.source(&sector[0]).map(|s| s.name.as_str()), Some("Building Act"));

    let again = resumed.import_candidates(&[candidate("Building Act", "https://gov.example/act")]);
    assert!(again.is_empty());
    assert_eq!(resumed.knowledge().blocks().count(), 3);

    assert_eq!(resumed.clear_sector_sources(), 1);
    assert!(!resumed.knowledge().contains_block(&sector[0]));
    assert!(resumed.remove_source(&doc).is_some());
    assert!(!resumed.knowledge().contains_block(&doc));
    assert!(resumed.knowledge().contains_block(&link));
}
