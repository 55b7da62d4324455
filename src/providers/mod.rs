//! Generative-AI oracle abstraction layer.
//!
//! Defines the [`TextOracle`] and [`SearchOracle`] traits and the shared
//! request/response types used by every pipeline stage. Business logic only
//! ever sees these types; vendor wire formats stay inside the provider
//! implementations.
//!
//! One provider is implemented:
//! - [`gemini::GeminiOracle`]: Google `generateContent` API, with optional
//!   search grounding.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod gemini;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// A single content part sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// Inline binary payload, base64-encoded.
    InlineData {
        /// MIME type of the payload (e.g. `application/pdf`).
        mime_type: String,
        /// Base64-encoded bytes.
        data: String,
    },
}

impl ContentPart {
    /// Convenience constructor for a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A title + URI pair returned by a search-augmented call as evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundingCitation {
    /// Page title as reported by the search backend.
    pub title: String,
    /// Source URI.
    pub uri: String,
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// A request to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    /// Model identifier (e.g. `gemini-2.5-flash`).
    pub model: String,
    /// Content parts, in order.
    pub parts: Vec<ContentPart>,
    /// Optional system instruction.
    pub system: Option<String>,
    /// Optional structured-output JSON schema. When set the oracle is asked
    /// for `application/json` output.
    pub response_schema: Option<serde_json::Value>,
    /// Whether to enable web-search grounding.
    pub search: bool,
}

impl OracleRequest {
    /// Build a single-text-part request for `model`.
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            parts: vec![ContentPart::text(prompt)],
            system: None,
            response_schema: None,
            search: false,
        }
    }

    /// Attach a system instruction.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Ask for structured JSON output matching `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Append another content part.
    #[must_use]
    pub fn with_part(mut self, part: ContentPart) -> Self {
        self.parts.push(part);
        self
    }
}

/// The oracle's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleResponse {
    /// Generated text (all text parts of the first candidate, joined).
    pub text: String,
    /// Grounding citations. Empty unless the request was search-augmented.
    pub citations: Vec<GroundingCitation>,
    /// Model version that served the response, when reported.
    pub model: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by oracle providers.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// HTTP transport failure.
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Response did not match expected schema.
    #[error("oracle response parse error: {0}")]
    Parse(String),
    /// Upstream responded with an error status.
    #[error("oracle returned non-success status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Oracle cannot satisfy the request with current configuration.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Check HTTP response status and return body text or a structured error.
///
/// # Errors
///
/// Returns `OracleError::Request` on transport failure, `OracleError::HttpStatus` on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, OracleError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(OracleError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"AIza[A-Za-z0-9_\-]{30,}",
        r"sk-[A-Za-z0-9_\-]{20,}",
        r"ya29\.[A-Za-z0-9_\-]{20,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Plain text generation.
///
/// Implementations must be `Send + Sync` so a single client can be shared by
/// every pipeline stage behind an `Arc`.
#[async_trait]
pub trait TextOracle: Send + Sync {
    /// Generate text for the request, honouring its `search` flag.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] on API, network, or parse failure.
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError>;
}

/// Search-augmented generation returning grounding citations.
#[async_trait]
pub trait SearchOracle: Send + Sync {
    /// Generate text with web-search grounding enabled regardless of the
    /// request's `search` flag.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] on API, network, or parse failure.
    async fn search(&self, request: OracleRequest) -> Result<OracleResponse, OracleError>;
}

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Strip a leading ```` ``` ```` / ```` ```markdown ```` fence and a trailing
/// ```` ``` ```` from generated text, then trim.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = match trimmed.get(..3) {
        Some("```") => {
            let rest = &trimmed[3..];
            match rest.get(..8) {
                Some(tag) if tag.eq_ignore_ascii_case("markdown") => &rest[8..],
                _ => rest,
            }
        }
        _ => trimmed,
    };
    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);
    without_close.trim().to_owned()
}

/// Recover a JSON document from model output that may be wrapped in markdown
/// fences or surrounded by chatter.
///
/// Keeps the span from the first `[`/`{` to the last `]`/`}`. Empty input
/// becomes `"[]"`.
pub fn clean_json(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "[]".to_owned();
    }
    let start = trimmed.find(['[', '{']);
    let end = trimmed.rfind([']', '}']);
    match (start, end) {
        (Some(start), Some(end)) if start <= end => trimmed[start..=end].to_owned(),
        _ => trimmed.to_owned(),
    }
}
