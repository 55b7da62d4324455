//! Knowledge intake: sources, document extraction, candidate deduplication
//! and the compiled knowledge buffer.
//!
//! Data flows one way: a file, link or accepted sector candidate becomes a
//! [`source::Source`]; files go through [`extractor`] and the summarizer; every
//! ready source lands as a tagged block in [`compiler::CompiledKnowledge`].
//! [`intake::SourceIntake`] owns the whole sequence.

pub mod compiler;
pub mod dedup;
pub mod extractor;
pub mod intake;
pub mod source;

use serde::{Deserialize, Serialize};

/// Knowledge-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// A block with this source id already exists in the buffer.
    #[error("knowledge buffer already holds a block for source '{0}'")]
    DuplicateBlock(String),
    /// Source ids become marker text and must be a single token.
    #[error("invalid source id '{0}': must be non-empty without whitespace or '>'")]
    InvalidSourceId(String),
    /// A status change that the source lifecycle does not allow.
    #[error("source '{id}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// Source id.
        id: String,
        /// Current status.
        from: &'static str,
        /// Requested status.
        to: &'static str,
    },
}

/// Label assigned to a discovered candidate from keywords in its title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    /// Laws, standards, certifications.
    RegulationCompliance,
    /// Reports, annual filings, PDFs.
    DocumentationReport,
    /// Trends, forecasts, market data.
    MarketIntelligence,
    /// Reviews and ratings.
    PublicSentiment,
    /// Anything else.
    IndustryInsight,
}

impl SourceCategory {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RegulationCompliance => "Regulation & Compliance",
            Self::DocumentationReport => "Official Documentation/Report",
            Self::MarketIntelligence => "Market Intelligence",
            Self::PublicSentiment => "Public Sentiment",
            Self::IndustryInsight => "Industry Insight",
        }
    }
}

/// A discovered reference the user may import as a sector-reference source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSource {
    /// Page title.
    pub title: String,
    /// Source URI as returned by the search backend.
    pub uri: String,
    /// Keyword-derived category.
    pub category: SourceCategory,
    /// Host name without `www.`, or `Web Source` when the URI does not parse.
    pub host: String,
}

impl CandidateSource {
    /// One-line description, e.g. `Market Intelligence • example.com`.
    pub fn description(&self) -> String {
        format!("{} • {}", self.category.label(), self.host)
    }
}
