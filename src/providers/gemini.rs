//! Gemini provider implementation using the `generateContent` API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credentials::ApiKey;

use super::{
    check_http_response, ContentPart, GroundingCitation, OracleError, OracleRequest,
    OracleResponse, SearchOracle, TextOracle,
};

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// `generateContent` request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation contents (always a single user turn here).
    pub contents: Vec<GeminiContent>,
    /// Optional system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    /// Tools; only `googleSearch` is used.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    /// Structured output configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

/// A content entry in Gemini format.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    /// Role: "user" or "model". Omitted for system instructions.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    /// Parts of the content.
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A single part in Gemini format.
#[doc(hidden)]
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    /// Text payload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    /// Inline binary payload.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub inline_data: Option<GeminiInlineData>,
}

/// Inline binary data.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    /// MIME type.
    pub mime_type: String,
    /// Base64 data.
    pub data: String,
}

/// Generation config for structured output.
#[doc(hidden)]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    /// Always `application/json` when a schema is given.
    pub response_mime_type: String,
    /// Response schema.
    pub response_schema: Value,
}

/// `generateContent` response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Candidate completions; only the first is read.
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Model version that served the response.
    #[serde(default)]
    pub model_version: Option<String>,
}

/// A candidate completion.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// Generated content.
    #[serde(default)]
    pub content: Option<GeminiContent>,
    /// Search grounding metadata.
    #[serde(default)]
    pub grounding_metadata: Option<GeminiGroundingMetadata>,
}

/// Grounding metadata attached to a search-augmented candidate.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGroundingMetadata {
    /// Grounding chunks.
    #[serde(default)]
    pub grounding_chunks: Vec<GeminiGroundingChunk>,
}

/// One grounding chunk.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GeminiGroundingChunk {
    /// Web source, when the chunk came from search.
    #[serde(default)]
    pub web: Option<GeminiWebSource>,
}

/// A web source reference.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GeminiWebSource {
    /// Source URI.
    #[serde(default)]
    pub uri: Option<String>,
    /// Page title.
    #[serde(default)]
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Gemini `generateContent` oracle.
#[derive(Debug, Clone)]
pub struct GeminiOracle {
    base_url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl GeminiOracle {
    /// Create a new Gemini oracle against `base_url`.
    pub fn new(base_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Endpoint URL for `model`.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    async fn send(&self, request: &OracleRequest, search: bool) -> Result<OracleResponse, OracleError> {
        let body = build_request(request, search);
        tracing::debug!(model = %request.model, search, parts = request.parts.len(), "gemini request");

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", self.api_key.expose())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a Gemini request body from an oracle request.
#[doc(hidden)]
pub fn build_request(request: &OracleRequest, search: bool) -> GeminiRequest {
    let parts = request.parts.iter().map(part_to_wire).collect();

    let tools = if search {
        vec![serde_json::json!({"googleSearch": {}})]
    } else {
        Vec::new()
    };

    GeminiRequest {
        contents: vec![GeminiContent {
            role: Some("user".to_owned()),
            parts,
        }],
        system_instruction: request.system.as_ref().map(|s| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(s.clone()),
                inline_data: None,
            }],
        }),
        tools,
        generation_config: request
            .response_schema
            .as_ref()
            .map(|schema| GeminiGenerationConfig {
                response_mime_type: "application/json".to_owned(),
                response_schema: schema.clone(),
            }),
    }
}

/// Parse a Gemini response body into an oracle response.
///
/// Text is the concatenation of all text parts of the first candidate.
/// Citations keep only chunks carrying both a URI and a title.
///
/// # Errors
///
/// Returns `OracleError::Parse` if the body cannot be deserialized.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<OracleResponse, OracleError> {
    let resp: GeminiResponse =
        serde_json::from_str(body).map_err(|e| OracleError::Parse(e.to_string()))?;

    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Ok(OracleResponse {
            model: resp.model_version,
            ..OracleResponse::default()
        });
    };

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    let citations = candidate
        .grounding_metadata
        .map(|meta| {
            meta.grounding_chunks
                .into_iter()
                .filter_map(|chunk| chunk.web)
                .filter_map(|web| match (web.uri, web.title) {
                    (Some(uri), Some(title)) if !uri.is_empty() && !title.is_empty() => {
                        Some(GroundingCitation { title, uri })
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(OracleResponse {
        text,
        citations,
        model: resp.model_version,
    })
}

fn part_to_wire(part: &ContentPart) -> GeminiPart {
    match part {
        ContentPart::Text { text } => GeminiPart {
            text: Some(text.clone()),
            inline_data: None,
        },
        ContentPart::InlineData { mime_type, data } => GeminiPart {
            text: None,
            inline_data: Some(GeminiInlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl TextOracle for GeminiOracle {
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let search = request.search;
        self.send(&request, search).await
    }
}

#[async_trait::async_trait]
impl SearchOracle for GeminiOracle {
    async fn search(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        self.send(&request, true).await
    }
}
