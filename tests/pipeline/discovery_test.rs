//! Sector discovery with primary and fallback searches.

use std::sync::Arc;

use agent_architect::discovery::{CompanyContext, DiscoveryError, SectorDiscovery, EMPTY_ANALYSIS};
use agent_architect::knowledge::SourceCategory;

use crate::fake_oracle::{cite, prompt_text, Reply, ScriptedOracle};

fn discovery(oracle: &Arc<ScriptedOracle>, max: usize) -> SectorDiscovery {
    SectorDiscovery::new(oracle.clone(), "pro", "flash", "analyst", max)
}

fn acme() -> CompanyContext {
    CompanyContext {
        name: "Acme Timber".to_owned(),
        website: "https://acme.example".to_owned(),
        description: "Sustainable wood products".to_owned(),
        existing_info: String::new(),
    }
}

#[tokio::test]
async fn enough_primary_citations_skip_fallback() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Reply::Cited(
        "prose is ignored".to_owned(),
        vec![
            cite("FSC certification rules", "https://fsc.example/rules"),
            cite("Acme Annual Report 2024", "https://www.acme.example/report"),
            cite("Timber market growth", "https://market.example/timber"),
        ],
    )]));

    let candidates = match discovery(&oracle, 15).discover(&acme()).await {
        Ok(candidates) => candidates,
        Err(err) => panic!("discovery should succeed: {err}"),
    };

    assert_eq!(oracle.calls(), 1);
    let requests = oracle.requests();
    assert_eq!(requests[0].model, "pro");
    assert!(prompt_text(&requests[0]).contains("\"Acme Timber\""));

    assert_eq!(candidates.len(), 3);
    assert_eq!(candidates[0].category, SourceCategory::RegulationCompliance);
    assert_eq!(candidates[1].category, SourceCategory::DocumentationReport);
    assert_eq!(candidates[1].host, "acme.example");
    assert_eq!(candidates[2].category, SourceCategory::MarketIntelligence);
}

#[tokio::test]
async fn sparse_primary_runs_fallback_and_merges() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        Reply::Cited(
            String::new(),
            vec![cite("Acme homepage", "https://acme.example/")],
        ),
        Reply::Cited(
            String::new(),
            vec![
                cite("Acme homepage", "https://acme.example/"),
                cite("Acme sustainability", "https://acme.example/esg.pdf"),
            ],
        ),
    ]));

    let candidates = match discovery(&oracle, 15).discover(&acme()).await {
        Ok(candidates) => candidates,
        Err(err) => panic!("discovery should succeed: {err}"),
    };

    assert_eq!(oracle.calls(), 2);
    let fallback = &oracle.requests()[1];
    assert_eq!(fallback.model, "flash");
    assert!(prompt_text(fallback).contains("TARGETED DOCUMENT SEARCH"));

    let uris: Vec<_> = candidates.iter().map(|c| c.uri.as_str()).collect();
    assert_eq!(uris, ["https://acme.example/", "https://acme.example/esg.pdf"]);
}

#[tokio::test]
async fn failed_fallback_keeps_primary_results() {
    let oracle = Arc::new(ScriptedOracle::new(vec![
        Reply::Cited(String::new(), vec![cite("Only one", "https://one.example")]),
        Reply::Fail("quota".to_owned()),
    ]));

    let candidates = match discovery(&oracle, 15).discover(&acme()).await {
        Ok(candidates) => candidates,
        Err(err) => panic!("fallback failure should not fail discovery: {err}"),
    };
    assert_eq!(candidates.len(), 1);
}

#[tokio::test]
async fn failed_primary_is_an_error() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Reply::Fail("no key".to_owned())]));
    let result = discovery(&oracle, 15).discover(&acme()).await;
    assert!(matches!(result, Err(DiscoveryError::Search(_))));
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn results_are_deduplicated_and_limited() {
    let citations = vec![
        cite("Login", "https://facebook.com/login"),
        cite("Page A", "https://a.example/"),
        cite("Page A copy", "http://www.a.example"),
        cite("Page B", "https://b.example"),
        cite("Page C", "https://c.example"),
    ];
    let oracle = Arc::new(ScriptedOracle::new(vec![Reply::Cited(String::new(), citations)]));

    let candidates = match discovery(&oracle, 2).discover(&acme()).await {
        Ok(candidates) => candidates,
        Err(err) => panic!("discovery should succeed: {err}"),
    };
    let titles: Vec<_> = candidates.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, ["Page A", "Page B"]);
}

#[tokio::test]
async fn empty_analysis_has_fixed_text() {
    let oracle = Arc::new(ScriptedOracle::texts(&["   "]));
    let analysis = discovery(&oracle, 15)
        .analyze_website("https://acme.example", "Acme Timber")
        .await;
    assert!(matches!(analysis, Ok(text) if text == EMPTY_ANALYSIS));

    let request = &oracle.requests()[0];
    assert_eq!(request.model, "analyst");
    assert!(prompt_text(request).contains("https://acme.example"));
}

#[tokio::test]
async fn failed_analysis_mentions_search_grounding() {
    let oracle = Arc::new(ScriptedOracle::new(vec![Reply::Fail("403".to_owned())]));
    let result = discovery(&oracle, 15)
        .analyze_website("https://acme.example", "Acme")
        .await;
    match result {
        Err(err @ DiscoveryError::Analysis(_)) => {
            assert!(err.to_string().contains("Google Search grounding"));
        }
        other => panic!("expected analysis error, got {other:?}"),
    }
}
