//! HTTP response sanitization and the Gemini client over a local socket.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use agent_architect::credentials::ApiKey;
use agent_architect::providers::gemini::GeminiOracle;
use agent_architect::providers::{
    check_http_response, OracleError, OracleRequest, SearchOracle, TextOracle,
};

async fn serve_once(status_line: &str, body: &str) -> String {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let status_line_owned = status_line.to_owned();
    let body_owned = body.to_owned();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut read_buf = [0_u8; 8192];
            let _ = socket.read(&mut read_buf).await;

            let response = format!(
                "HTTP/1.1 {status_line_owned}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body_owned}",
                body_owned.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    format!("http://{addr}")
}

fn test_key() -> ApiKey {
    match ApiKey::new("test-key") {
        Ok(key) => key,
        Err(err) => panic!("key should be accepted: {err}"),
    }
}

#[tokio::test]
async fn check_http_response_redacts_google_keys() {
    let raw_key = "AIzaSyD-abcdefghijklmnopqrstuvwxyz012345";
    let body = format!("{{\"error\": \"API key not valid: {raw_key}\"}}");
    let url = serve_once("400 Bad Request", &body).await;

    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };

    match check_http_response(response).await {
        Err(OracleError::HttpStatus { status, body }) => {
            assert_eq!(status, 400);
            assert!(!body.contains(raw_key));
            assert!(body.contains("[REDACTED]"));
        }
        Err(other) => panic!("expected http status error, got: {other}"),
        Ok(body) => panic!("non-success status should fail, got body {body}"),
    }
}

#[tokio::test]
async fn check_http_response_truncates_long_error_body() {
    let body = "x".repeat(400);
    let url = serve_once("500 Internal Server Error", &body).await;

    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };

    match check_http_response(response).await {
        Err(OracleError::HttpStatus { body, .. }) => {
            assert!(body.ends_with("...[truncated]"));
            assert!(body.len() < 300);
        }
        other => panic!("expected truncated http status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn gemini_oracle_parses_grounded_answer() {
    let body = r#"{
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Found "}, {"text": "two sources."}]},
            "groundingMetadata": {"groundingChunks": [
                {"web": {"uri": "https://iso.example/9001", "title": "ISO 9001"}},
                {"web": {"uri": "https://no-title.example"}}
            ]}
        }],
        "modelVersion": "gemini-2.5-flash"
    }"#;
    let base = serve_once("200 OK", body).await;
    let oracle = GeminiOracle::new(base, test_key());

    let response = match oracle
        .search(OracleRequest::text("gemini-2.5-flash", "find sources"))
        .await
    {
        Ok(response) => response,
        Err(err) => panic!("search should succeed: {err}"),
    };
    assert_eq!(response.text, "Found two sources.");
    assert_eq!(response.citations.len(), 1);
    assert_eq!(response.citations[0].title, "ISO 9001");
    assert_eq!(response.model.as_deref(), Some("gemini-2.5-flash"));
}

#[tokio::test]
async fn gemini_oracle_surfaces_quota_errors() {
    let base = serve_once("429 Too Many Requests", r#"{"error": "quota exceeded"}"#).await;
    let oracle = GeminiOracle::new(base, test_key());

    let result = oracle
        .generate(OracleRequest::text("gemini-2.5-flash", "hello"))
        .await;
    assert!(matches!(
        result,
        Err(OracleError::HttpStatus { status: 429, .. })
    ));
}
