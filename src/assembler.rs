//! Prompt assembly: identity, rules and knowledge in, instruction text out.

use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::{IdentityFields, AUTO_MATCH_PREFIX};
use crate::knowledge::compiler::CompiledKnowledge;
use crate::providers::{strip_code_fences, OracleError, OracleRequest, TextOracle};

/// Returned when the oracle answers with empty text.
pub const EMPTY_ASSEMBLY: &str = "Failed to generate prompt.";

/// Added when the knowledge holds sector references.
const SECTOR_INSTRUCTION: &str = "[CONTEXTUAL AWARENESS & SECTOR INTELLIGENCE]\n\
The Knowledge Base below contains verified industry insights, regulations, and trends \
specifically for this company's sector.\n\
1. USE THIS KNOWLEDGE: If a user asks about certifications, regulations, or market trends, \
quote the provided knowledge sources accurately.\n\
2. ADAPT TO SECTOR: Use the specific jargon and professional tone found in the sector analysis.\n\
3. BE PROACTIVE: If the sector data suggests specific compliance needs (e.g. safety rules), \
mention them when relevant.";

const OUTPUT_INSTRUCTION: &str = "OUTPUT:\n\
Return ONLY the system prompt text. No introductory text.\n\
Structure it with clear headers like [ROLE], [KNOWLEDGE], [RULES], [CONVERSATION FLOW].\n\
Ensure the [KNOWLEDGE] section is comprehensive based on the provided Knowledge Base.\n\
If the Tone settings requested Auto-Match language, include a strict instruction in the \
system prompt for the agent to detect and match the user's language.";

/// Assembly errors. These reach the user directly.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// The draft has no name.
    #[error("provide an agent name before generating instructions")]
    MissingName,
    /// The oracle call failed.
    #[error("failed to generate instructions: {0}")]
    Oracle(#[from] OracleError),
}

/// Builds instruction text through the text oracle.
#[derive(Clone)]
pub struct PromptAssembler {
    oracle: Arc<dyn TextOracle>,
    model: String,
}

/// Rewrite an auto-match tone into an explicit language instruction. Other
/// tones pass through.
pub fn language_context(tone: &str) -> String {
    match tone.strip_prefix(AUTO_MATCH_PREFIX) {
        Some(style) => format!(
            "Style: {style}. REQUIREMENT: The agent must auto-detect the user's language and \
             reply in that same language. Do NOT default to English unless the user speaks English."
        ),
        None => tone.to_owned(),
    }
}

impl PromptAssembler {
    /// Create an assembler using `model`.
    pub fn new(oracle: Arc<dyn TextOracle>, model: impl Into<String>) -> Self {
        Self {
            oracle,
            model: model.into(),
        }
    }

    /// The request sent for the given inputs.
    pub fn build_request(
        &self,
        identity: &IdentityFields,
        rules: &str,
        knowledge: &CompiledKnowledge,
        sector_enriched: bool,
    ) -> OracleRequest {
        let website = identity
            .website
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .unwrap_or("Not provided");
        let enrichment = if sector_enriched {
            SECTOR_INSTRUCTION
        } else {
            ""
        };
        let prompt = format!(
            "You are an expert AI Architect building a bot for a client.\n\
             Task: Create a highly specific System Prompt.\n\n\
             DATA:\n\
             - Name: {name}\n\
             - Website: {website}\n\
             - Role: {role}\n\
             - Tone/Language: {tone}\n\
             - Flow: {flow}\n\
             - Rules: {rules}\n\
             - Knowledge Base (Extracted from inputs/documents): {knowledge}\n\n\
             {enrichment}\n\n\
             {OUTPUT_INSTRUCTION}",
            name = identity.name,
            role = identity.description,
            tone = language_context(&identity.tone),
            flow = identity.flow,
            knowledge = knowledge.render(),
        );
        OracleRequest::text(self.model.clone(), prompt)
    }

    /// Assemble instruction text. Code fences around the answer are
    /// stripped; nothing else is validated.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::MissingName`] before calling the oracle when
    /// the name is blank, or [`AssembleError::Oracle`] if the call fails.
    pub async fn assemble(
        &self,
        identity: &IdentityFields,
        rules: &str,
        knowledge: &CompiledKnowledge,
        sector_enriched: bool,
    ) -> Result<String, AssembleError> {
        if identity.name.trim().is_empty() {
            return Err(AssembleError::MissingName);
        }
        let request = self.build_request(identity, rules, knowledge, sector_enriched);
        debug!(agent = %identity.name, sector_enriched, "assembling instructions");
        let response = self.oracle.generate(request).await?;

        let text = strip_code_fences(&response.text);
        if text.is_empty() {
            info!(agent = %identity.name, "oracle returned no instructions");
            return Ok(EMPTY_ASSEMBLY.to_owned());
        }
        Ok(text)
    }
}
