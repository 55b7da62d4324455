//! Source intake: turns uploads, links and accepted candidates into sources
//! and keeps the knowledge buffer in step with them.
//!
//! Every ready source owns exactly one block in the buffer, tagged with its
//! id. Failed sources own none. Removing a source removes its block and
//! nothing else.

use tracing::{info, warn};

use super::compiler::{CompiledKnowledge, KnowledgeBlock};
use super::dedup::dedupe;
use super::extractor::{extract, EXTRACTION_FAILED};
use super::source::{Source, SourceKind, SourceStatus, SECTOR_ID_PREFIX};
use super::{CandidateSource, KnowledgeError};
use crate::summarizer::Summarizer;

/// Block text for a pasted link.
const LINK_NOTE: &str =
    "(Note: The agent should use its internal knowledge about this website if available)";

/// Rebuild the live source behind a saved block. Sector blocks carry their
/// URI on the second text line; link blocks end with [`LINK_NOTE`].
fn restore_source(block: &KnowledgeBlock) -> Option<Source> {
    let name = block.source_name().unwrap_or(block.source_id.as_str());
    let text = block.text();
    let mut source = if block.source_id.starts_with(SECTOR_ID_PREFIX) {
        let source = Source::with_id(&block.source_id, SourceKind::SectorReference, name);
        match text.lines().nth(1).map(str::trim).filter(|uri| !uri.is_empty()) {
            Some(uri) => source.with_origin_uri(uri),
            None => source,
        }
    } else if text.ends_with(LINK_NOTE) {
        Source::with_id(&block.source_id, SourceKind::Link, name)
    } else {
        Source::with_id(&block.source_id, SourceKind::from_file_name(name), name)
    };
    match source.mark_ready(text) {
        Ok(()) => Some(source),
        Err(e) => {
            warn!(source_id = %block.source_id, error = %e, "could not restore source");
            None
        }
    }
}

/// Sources plus the knowledge buffer for one draft.
pub struct SourceIntake {
    summarizer: Summarizer,
    sources: Vec<Source>,
    knowledge: CompiledKnowledge,
}

impl SourceIntake {
    /// Start with an empty buffer.
    pub fn new(summarizer: Summarizer) -> Self {
        Self::with_knowledge(summarizer, CompiledKnowledge::new())
    }

    /// Resume from an existing buffer (editing a saved agent). Every block
    /// gets a `ready` source back so it can be removed, and so imported sector
    /// references are not imported twice.
    pub fn with_knowledge(summarizer: Summarizer, knowledge: CompiledKnowledge) -> Self {
        let sources = knowledge.blocks().filter_map(restore_source).collect();
        Self {
            summarizer,
            sources,
            knowledge,
        }
    }

    /// Live sources in the order they were added.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Look up a source by id.
    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// The compiled buffer.
    pub fn knowledge(&self) -> &CompiledKnowledge {
        &self.knowledge
    }

    /// Replace the buffer after a manual edit in its text form.
    pub fn set_knowledge_text(&mut self, buffer: &str) {
        self.knowledge = CompiledKnowledge::parse(buffer);
    }

    /// Consume the intake and return the buffer.
    pub fn into_knowledge(self) -> CompiledKnowledge {
        self.knowledge
    }

    /// Whether any sector-reference source is live.
    pub fn has_sector_sources(&self) -> bool {
        self.sources
            .iter()
            .any(|s| s.kind == SourceKind::SectorReference)
    }

    /// Origin URIs of imported sector references.
    pub fn imported_origin_uris(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter_map(|s| s.origin_uri.as_deref())
            .collect()
    }

    fn finish_ready(&mut self, mut source: Source, text: String) -> Result<String, KnowledgeError> {
        self.knowledge.append_block(&source.id, &source.name, &text)?;
        source.mark_ready(text)?;
        let id = source.id.clone();
        self.sources.push(source);
        Ok(id)
    }

    /// Extract and summarize one uploaded file. Failures are recorded on the
    /// source (status `error`, fixed message) and never returned; the source
    /// id is always returned.
    pub async fn ingest_file(&mut self, name: &str, bytes: &[u8]) -> String {
        let kind = SourceKind::from_file_name(name);
        let mut source = Source::pending(kind, name);
        let id = source.id.clone();
        info!(source_id = %id, name, kind = kind.as_str(), "ingesting file");

        if let Err(e) = source.begin_processing() {
            warn!(source_id = %id, error = %e, "unexpected source state");
        }

        let summary = match extract(kind, bytes) {
            Ok(content) => match self.summarizer.summarize(&content, name).await {
                Ok(summary) => Ok(summary),
                Err(e) => {
                    warn!(source_id = %id, error = %e, "summarization failed");
                    Err(())
                }
            },
            Err(e) => {
                warn!(source_id = %id, error = %e, "extraction failed");
                Err(())
            }
        };

        match summary {
            Ok(summary) => {
                if let Err(e) = self.finish_ready(source.clone(), summary) {
                    warn!(source_id = %id, error = %e, "could not append knowledge block");
                    self.push_failed(source);
                }
            }
            Err(()) => self.push_failed(source),
        }
        id
    }

    fn push_failed(&mut self, mut source: Source) {
        if let Err(e) = source.mark_error(EXTRACTION_FAILED) {
            warn!(source_id = %source.id, error = %e, "unexpected source state");
        }
        self.sources.push(source);
    }

    /// Ingest a batch of files in order. One file failing does not stop the
    /// others.
    pub async fn ingest_files(&mut self, files: Vec<(String, Vec<u8>)>) -> Vec<String> {
        let mut ids = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            ids.push(self.ingest_file(&name, &bytes).await);
        }
        ids
    }

    /// Add a pasted URL. Links are ready immediately; the block asks the
    /// agent to use what it knows about the site.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] if the block cannot be appended.
    pub fn add_link(&mut self, url: &str) -> Result<String, KnowledgeError> {
        let url = url.trim();
        let source = Source::pending(SourceKind::Link, url);
        info!(source_id = %source.id, url, "adding link source");
        self.finish_ready(source, format!("{url}\n{LINK_NOTE}"))
    }

    /// Import accepted sector candidates. Candidates are deduplicated against
    /// each other and against references already imported; the first
    /// occurrence wins and order is preserved. Returns the new source ids.
    pub fn import_candidates(&mut self, candidates: &[CandidateSource]) -> Vec<String> {
        let imported: Vec<String> = self
            .imported_origin_uris()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let fresh = dedupe(candidates.to_vec(), imported.iter().map(String::as_str));

        let mut ids = Vec::with_capacity(fresh.len());
        for candidate in fresh {
            let source = Source::pending(SourceKind::SectorReference, candidate.title.as_str())
                .with_origin_uri(candidate.uri.as_str());
            let text = format!(
                "{}\n{}\nVerified source via web search.",
                candidate.description(),
                candidate.uri
            );
            match self.finish_ready(source, text) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(uri = %candidate.uri, error = %e, "skipping sector candidate"),
            }
        }
        info!(imported = ids.len(), offered = candidates.len(), "sector candidates imported");
        ids
    }

    /// Remove a source and its block. Returns the removed source.
    pub fn remove_source(&mut self, id: &str) -> Option<Source> {
        let index = self.sources.iter().position(|s| s.id == id)?;
        let source = self.sources.remove(index);
        if source.status == SourceStatus::Ready && !self.knowledge.remove_block(id) {
            warn!(source_id = %id, "ready source had no block in the knowledge buffer");
        }
        Some(source)
    }

    /// Remove every sector-reference source and its block. Returns how many
    /// were removed.
    pub fn clear_sector_sources(&mut self) -> usize {
        let ids: Vec<String> = self
            .sources
            .iter()
            .filter(|s| s.kind == SourceKind::SectorReference)
            .map(|s| s.id.clone())
            .collect();
        for id in &ids {
            self.remove_source(id);
        }
        ids.len()
    }
}
