//! The `Source` record and its status lifecycle.
//!
//! `pending → processing → {ready | error}`. Link and sector-reference sources
//! skip extraction and go straight from `pending` to `ready`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::KnowledgeError;

/// What kind of artifact a source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// `.pdf` upload.
    DocumentPdf,
    /// `.docx` upload.
    DocumentWord,
    /// `.xlsx` upload.
    DocumentSpreadsheet,
    /// Pasted URL.
    Link,
    /// Plain text or CSV upload.
    PlainText,
    /// Imported sector discovery candidate.
    SectorReference,
}

impl SourceKind {
    /// Classify an uploaded file by extension. Unknown extensions are read as
    /// plain text.
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Self::DocumentPdf
        } else if lower.ends_with(".docx") {
            Self::DocumentWord
        } else if lower.ends_with(".xlsx") {
            Self::DocumentSpreadsheet
        } else {
            Self::PlainText
        }
    }

    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentPdf => "document-pdf",
            Self::DocumentWord => "document-word",
            Self::DocumentSpreadsheet => "document-spreadsheet",
            Self::Link => "link",
            Self::PlainText => "plain-text",
            Self::SectorReference => "sector-reference",
        }
    }
}

/// Lifecycle state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Registered, not yet picked up.
    Pending,
    /// Extraction / summarization in flight.
    Processing,
    /// Summary available and appended to the knowledge buffer.
    Ready,
    /// Failed; `summary` holds a short description.
    Error,
}

impl SourceStatus {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Whether the status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

/// One knowledge contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Opaque unique token; also the block tag in the knowledge buffer.
    pub id: String,
    /// Display label (file name, URL or title).
    pub name: String,
    /// Artifact kind.
    pub kind: SourceKind,
    /// Lifecycle state.
    pub status: SourceStatus,
    /// Summary once ready, failure description on error.
    pub summary: Option<String>,
    /// Canonical URI, set for sector references only.
    pub origin_uri: Option<String>,
}

/// Fresh opaque id for an uploaded or pasted source.
pub fn new_source_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Id prefix that marks a sector-reference source.
pub const SECTOR_ID_PREFIX: &str = "sector-";

/// Fresh opaque id for a sector-reference source.
pub fn new_sector_id() -> String {
    format!("{SECTOR_ID_PREFIX}{}", Uuid::new_v4().simple())
}

impl Source {
    /// A new `pending` source with a fresh id.
    pub fn pending(kind: SourceKind, name: impl Into<String>) -> Self {
        let id = match kind {
            SourceKind::SectorReference => new_sector_id(),
            _ => new_source_id(),
        };
        Self::with_id(id, kind, name)
    }

    /// A new `pending` source with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, kind: SourceKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            status: SourceStatus::Pending,
            summary: None,
            origin_uri: None,
        }
    }

    /// Attach the canonical URI of a sector reference.
    #[must_use]
    pub fn with_origin_uri(mut self, uri: impl Into<String>) -> Self {
        self.origin_uri = Some(uri.into());
        self
    }

    fn transition(&mut self, to: SourceStatus) -> Result<(), KnowledgeError> {
        let allowed = matches!(
            (self.status, to),
            (SourceStatus::Pending, SourceStatus::Processing)
                | (SourceStatus::Pending, SourceStatus::Ready)
                | (SourceStatus::Pending, SourceStatus::Error)
                | (SourceStatus::Processing, SourceStatus::Ready)
                | (SourceStatus::Processing, SourceStatus::Error)
        );
        if !allowed {
            return Err(KnowledgeError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }

    /// `pending → processing`.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::InvalidTransition`] from any other state.
    pub fn begin_processing(&mut self) -> Result<(), KnowledgeError> {
        self.transition(SourceStatus::Processing)
    }

    /// Move to `ready` with its summary.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::InvalidTransition`] if already terminal.
    pub fn mark_ready(&mut self, summary: impl Into<String>) -> Result<(), KnowledgeError> {
        self.transition(SourceStatus::Ready)?;
        self.summary = Some(summary.into());
        Ok(())
    }

    /// Move to `error` with a short human-readable description.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::InvalidTransition`] if already terminal.
    pub fn mark_error(&mut self, message: impl Into<String>) -> Result<(), KnowledgeError> {
        self.transition(SourceStatus::Error)?;
        self.summary = Some(message.into());
        Ok(())
    }
}
