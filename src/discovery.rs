//! Sector discovery and website analysis through the search oracle.
//!
//! Discovery asks the search-augmented oracle for verifiable third-party
//! references about a company. Only the grounding citations are used; the
//! generated prose is discarded. When the primary search yields fewer than
//! two usable citations, one targeted fallback search runs and its citations
//! are merged in.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::knowledge::dedup::dedupe_with_limit;
use crate::knowledge::{CandidateSource, SourceCategory};
use crate::providers::{GroundingCitation, OracleError, OracleRequest, SearchOracle};

/// Primary searches yielding fewer citations than this trigger the fallback.
const MIN_PRIMARY_CITATIONS: usize = 2;

/// Returned by [`SectorDiscovery::analyze_website`] when the oracle is silent.
pub const EMPTY_ANALYSIS: &str = "Could not analyze website.";

/// Host label for URIs that do not parse.
const UNKNOWN_HOST: &str = "Web Source";

/// Discovery errors.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The primary search call failed.
    #[error("sector discovery failed: {0}")]
    Search(#[source] OracleError),
    /// Website analysis failed. Usually the key lacks search grounding.
    #[error(
        "website analysis failed ({0}); ensure the API key supports Google Search grounding"
    )]
    Analysis(#[source] OracleError),
}

/// What discovery knows about the company.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyContext {
    /// Company name.
    pub name: String,
    /// Company website URL.
    pub website: String,
    /// Role or business description.
    pub description: String,
    /// Knowledge already compiled for the draft.
    pub existing_info: String,
}

/// Search-backed discovery client.
#[derive(Clone)]
pub struct SectorDiscovery {
    oracle: Arc<dyn SearchOracle>,
    primary_model: String,
    fallback_model: String,
    analyze_model: String,
    max_candidates: usize,
}

impl SectorDiscovery {
    /// Create a discovery client.
    pub fn new(
        oracle: Arc<dyn SearchOracle>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
        analyze_model: impl Into<String>,
        max_candidates: usize,
    ) -> Self {
        Self {
            oracle,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
            analyze_model: analyze_model.into(),
            max_candidates,
        }
    }

    /// Discover candidate references for `ctx`.
    ///
    /// The result is deduplicated and truncated; an empty list means nothing
    /// usable was found. A failing fallback search keeps the primary results.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Search`] if the primary search fails.
    pub async fn discover(
        &self,
        ctx: &CompanyContext,
    ) -> Result<Vec<CandidateSource>, DiscoveryError> {
        let primary = self
            .oracle
            .search(OracleRequest::text(
                self.primary_model.clone(),
                primary_prompt(ctx),
            ))
            .await
            .map_err(DiscoveryError::Search)?;

        let mut citations = usable_citations(primary.citations);
        info!(company = %ctx.name, citations = citations.len(), "primary sector search done");

        if citations.len() < MIN_PRIMARY_CITATIONS {
            info!(company = %ctx.name, "low grounding results, running targeted document search");
            match self
                .oracle
                .search(OracleRequest::text(
                    self.fallback_model.clone(),
                    fallback_prompt(&ctx.name),
                ))
                .await
            {
                Ok(fallback) => {
                    citations = merge_citations(citations, usable_citations(fallback.citations));
                }
                Err(e) => warn!(company = %ctx.name, error = %e, "fallback sector search failed"),
            }
        }

        let candidates = candidates_from_citations(&citations);
        let accepted = dedupe_with_limit(candidates, std::iter::empty(), self.max_candidates);
        info!(company = %ctx.name, candidates = accepted.len(), "sector discovery complete");
        Ok(accepted)
    }

    /// Produce a structured company profile from its website.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Analysis`] if the search call fails.
    pub async fn analyze_website(
        &self,
        url: &str,
        company_name: &str,
    ) -> Result<String, DiscoveryError> {
        let response = self
            .oracle
            .search(OracleRequest::text(
                self.analyze_model.clone(),
                analysis_prompt(url, company_name),
            ))
            .await
            .map_err(|e| {
                warn!(url, error = %e, "website analysis failed");
                DiscoveryError::Analysis(e)
            })?;

        let text = response.text.trim();
        if text.is_empty() {
            Ok(EMPTY_ANALYSIS.to_owned())
        } else {
            Ok(text.to_owned())
        }
    }
}

fn usable_citations(citations: Vec<GroundingCitation>) -> Vec<GroundingCitation> {
    citations
        .into_iter()
        .filter(|c| !c.uri.is_empty() && !c.title.is_empty())
        .collect()
}

/// Append `extra` citations whose raw URI is not already present.
fn merge_citations(
    mut base: Vec<GroundingCitation>,
    extra: Vec<GroundingCitation>,
) -> Vec<GroundingCitation> {
    let mut seen: HashSet<String> = base.iter().map(|c| c.uri.clone()).collect();
    for citation in extra {
        if seen.insert(citation.uri.clone()) {
            base.push(citation);
        }
    }
    base
}

/// Turn citations into categorized candidates, in order.
pub fn candidates_from_citations(citations: &[GroundingCitation]) -> Vec<CandidateSource> {
    citations
        .iter()
        .map(|c| CandidateSource {
            title: c.title.clone(),
            uri: c.uri.clone(),
            category: categorize(&c.title, &c.uri),
            host: host_label(&c.uri),
        })
        .collect()
}

/// Keyword category for a citation. Checked in priority order: regulation,
/// documentation, market, sentiment.
pub fn categorize(title: &str, uri: &str) -> SourceCategory {
    let title = title.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| title.contains(w));

    if has(&["wet", "law", "act", "rule", "regu", "iso", "compliance"]) {
        SourceCategory::RegulationCompliance
    } else if has(&["report", "annual", "esg", "sustain"]) || uri.to_lowercase().ends_with(".pdf")
    {
        SourceCategory::DocumentationReport
    } else if has(&["trend", "forecast", "market", "growth"]) {
        SourceCategory::MarketIntelligence
    } else if has(&["review", "rating"]) {
        SourceCategory::PublicSentiment
    } else {
        SourceCategory::IndustryInsight
    }
}

/// Host name without a leading `www.`, or `Web Source`.
pub fn host_label(uri: &str) -> String {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .map(|host| host.strip_prefix("www.").map(str::to_owned).unwrap_or(host))
        .unwrap_or_else(|| UNKNOWN_HOST.to_owned())
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn primary_prompt(ctx: &CompanyContext) -> String {
    format!(
        "You are a Sector Intelligence Research Agent.\n\n\
         Goal:\n\
         For the company \"{name}\" located at \"{website}\" (Context: \"{description}\"), \
         you MUST find and verify external knowledge sources.\n\
         You are NOT allowed to stop with \"no specific sources found\" as long as any \
         relevant document exists online.\n\n\
         Procedure:\n\
         1. Open the company URL and infer: sector, country/region, and main products/services.\n\
         2. Search and collect ONLY verifiable documents that match at least one of these categories:\n\
            - Company documentation: manuals, product sheets, application guides, safety data \
         sheets, FAQs, ESG reports, Annual Reports.\n\
            - Sector & regulation: laws, guidelines, standards, certifications (ISO, NEN, GDPR), \
         compliance requirements relevant to this industry.\n\
            - Sustainability: LCA/EPD, ESG/CSR reports, CO2 or energy data.\n\
            - Technical / usage info: best practices, whitepapers.\n\n\
         Verification rules:\n\
         - Prefer official domains: the company's own site, regulators, standards bodies, \
         recognised industry associations.\n\
         - Ignore blogs, opinions, marketing fluff without factual data.\n\n\
         OUTPUT:\n\
         Return a list of 5-15 verified sources.\n\
         You MUST cite the sources so they appear in the grounding metadata.",
        name = ctx.name,
        website = ctx.website,
        description = ctx.description,
    )
}

fn fallback_prompt(name: &str) -> String {
    format!(
        "PERFORM TARGETED DOCUMENT SEARCH for \"{name}\".\n\n\
         We need specific files and reports. Search specifically for:\n\
         1. \"{name} annual report filetype:pdf\"\n\
         2. \"{name} sustainability report filetype:pdf\"\n\
         3. \"Regulations affecting {name} industry\"\n\
         4. \"{name} technical specifications OR manual\"\n\n\
         Find at least 5 documents. Return the list with citations."
    )
}

fn analysis_prompt(url: &str, company_name: &str) -> String {
    format!(
        "You are a Senior Business Analyst.\n\
         Perform a deep, comprehensive analysis of the company \"{company_name}\" based on \
         their website: {url}.\n\n\
         You MUST use Google Search to explore the website and related verified sources.\n\
         Do not just look at the homepage; look for \"About Us\", \"Products\", \"Projects\", \
         and \"Technical Specifications\".\n\n\
         OUTPUT FORMAT (Strictly follow this structure):\n\n\
         1. **Who are they?**\n\
            - Origin, location, core identity, and market positioning.\n\n\
         2. **What do they do?**\n\
            - Core activities, services, and unique value proposition.\n\n\
         3. **Product/Service Portfolio** (BE SPECIFIC):\n\
            - List specific product categories.\n\
            - **CRITICAL:** List specific BRAND NAMES, technical materials, or proprietary \
         technologies mentioned.\n\n\
         4. **Applications & Projects**:\n\
            - Where are their products used?\n\
            - Name specific reference projects if found.\n\n\
         5. **Technical & Compliance**:\n\
            - List certifications (ISO, FSC, PEFC, EPD).\n\
            - Mention sustainability commitments or specific technical standards they adhere to.\n\n\
         Use a professional, factual tone."
    )
}
