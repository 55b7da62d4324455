//! Document summarization through the text oracle.

use std::sync::Arc;

use crate::knowledge::extractor::ExtractedContent;
use crate::providers::{ContentPart, OracleError, OracleRequest, TextOracle};

/// Compresses extracted documents into bullet summaries for the knowledge
/// buffer. No retries: errors go back to the caller, which marks the source
/// as failed.
#[derive(Clone)]
pub struct Summarizer {
    oracle: Arc<dyn TextOracle>,
    model: String,
    max_chars: usize,
}

impl Summarizer {
    /// Create a summarizer. Text content is cut to `max_chars` characters.
    pub fn new(oracle: Arc<dyn TextOracle>, model: impl Into<String>, max_chars: usize) -> Self {
        Self {
            oracle,
            model: model.into(),
            max_chars,
        }
    }

    /// Build the oracle request for `content` labelled `label`.
    pub fn build_request(&self, content: &ExtractedContent, label: &str) -> OracleRequest {
        let prompt = format!(
            "Analyze the attached document/text ({label}).\n\
             Task: Extract all key business information, FAQs, pricing, rules, and facts \
             that an AI agent needs to know to answer customer questions.\n\n\
             Output Format:\n\
             Summary of {label}:\n\
             - [Key Point 1]\n\
             - [Key Point 2]\n\
             ..."
        );

        let part = match content {
            ExtractedContent::Inline { mime_type, data } => ContentPart::InlineData {
                mime_type: mime_type.clone(),
                data: data.clone(),
            },
            ExtractedContent::Text(text) => {
                let truncated: String = text.chars().take(self.max_chars).collect();
                ContentPart::text(format!("DOCUMENT CONTENT:\n{truncated}"))
            }
        };

        OracleRequest::text(self.model.clone(), prompt).with_part(part)
    }

    /// Summarize `content`. The result may differ between identical calls.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] if the oracle call fails.
    pub async fn summarize(
        &self,
        content: &ExtractedContent,
        label: &str,
    ) -> Result<String, OracleError> {
        let request = self.build_request(content, label);
        let response = self.oracle.generate(request).await?;
        tracing::debug!(label, chars = response.text.len(), "document summarized");
        Ok(response.text.trim().to_owned())
    }
}
