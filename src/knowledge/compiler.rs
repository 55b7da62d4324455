//! The compiled knowledge buffer.
//!
//! Internally a list of typed segments: free text the user may edit, and
//! blocks tagged with a source id. The delimited text form only exists at the
//! editing boundary ([`CompiledKnowledge::parse`] / [`CompiledKnowledge::render`]):
//!
//! ```text
//! <<<<BLOCK_START:{source_id}>>>>
//! [SOURCE: {source_name}]
//! {text}
//! <<<<BLOCK_END>>>>
//! ```
//!
//! `parse` followed by `render` reproduces the input byte for byte.

use std::fmt;

use super::KnowledgeError;

const START_PREFIX: &str = "<<<<BLOCK_START:";
const START_SUFFIX: &str = ">>>>";
const END_MARKER: &str = "<<<<BLOCK_END>>>>";
const NAME_PREFIX: &str = "[SOURCE: ";
const BLOCK_SEPARATOR: &str = "\n\n";

/// A tagged block. `body` is everything between the start and end markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBlock {
    /// Source id from the start marker.
    pub source_id: String,
    /// Raw text between the markers, including the surrounding newlines.
    pub body: String,
}

impl KnowledgeBlock {
    fn new(source_id: &str, source_name: &str, text: &str) -> Self {
        Self {
            source_id: source_id.to_owned(),
            body: format!("\n{NAME_PREFIX}{source_name}]\n{text}\n"),
        }
    }

    /// The `[SOURCE: ...]` label, if the header line is intact.
    pub fn source_name(&self) -> Option<&str> {
        let header = self.body.strip_prefix('\n')?.lines().next()?;
        header.strip_prefix(NAME_PREFIX)?.strip_suffix(']')
    }

    /// Block content below the header line, without the framing newlines.
    pub fn text(&self) -> &str {
        let inner = self.body.strip_prefix('\n').unwrap_or(&self.body);
        let inner = inner.strip_suffix('\n').unwrap_or(inner);
        match self.source_name() {
            Some(_) => inner.split_once('\n').map(|(_, rest)| rest).unwrap_or(""),
            None => inner,
        }
    }
}

/// One piece of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Free text, including any manual edits.
    Text(String),
    /// A source-tagged block.
    Block(KnowledgeBlock),
}

/// The knowledge buffer as typed segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledKnowledge {
    segments: Vec<Segment>,
}

fn validate_id(source_id: &str) -> Result<(), KnowledgeError> {
    let valid = !source_id.is_empty()
        && !source_id.contains('>')
        && !source_id.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(KnowledgeError::InvalidSourceId(source_id.to_owned()))
    }
}

impl CompiledKnowledge {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the delimited text form.
    ///
    /// A start marker becomes a block only when a well-formed id and a later
    /// end marker exist with no other start marker in between; the block
    /// closes at the first end marker. Anything else stays free text, so a
    /// block that lost its end marker never swallows the block after it.
    pub fn parse(buffer: &str) -> Self {
        let mut knowledge = Self::new();
        let mut rest = buffer;

        while let Some((before, after_prefix)) = rest.split_once(START_PREFIX) {
            knowledge.push_text(before);
            let parsed = after_prefix
                .split_once(START_SUFFIX)
                .and_then(|(id, after_start)| {
                    validate_id(id).ok()?;
                    let (body, remainder) = after_start.split_once(END_MARKER)?;
                    if body.contains(START_PREFIX) {
                        return None;
                    }
                    Some((id, body, remainder))
                });

            match parsed {
                Some((id, body, remainder)) => {
                    knowledge.segments.push(Segment::Block(KnowledgeBlock {
                        source_id: id.to_owned(),
                        body: body.to_owned(),
                    }));
                    rest = remainder;
                }
                None => {
                    knowledge.push_text(START_PREFIX);
                    rest = after_prefix;
                }
            }
        }
        knowledge.push_text(rest);
        knowledge
    }

    /// Serialize to the delimited text form.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Block(block) => {
                    out.push_str(START_PREFIX);
                    out.push_str(&block.source_id);
                    out.push_str(START_SUFFIX);
                    out.push_str(&block.body);
                    out.push_str(END_MARKER);
                }
            }
        }
        out
    }

    /// All segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Tagged blocks in order.
    pub fn blocks(&self) -> impl Iterator<Item = &KnowledgeBlock> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Block(block) => Some(block),
            Segment::Text(_) => None,
        })
    }

    /// Whether a block tagged `source_id` exists.
    pub fn contains_block(&self, source_id: &str) -> bool {
        self.blocks().any(|b| b.source_id == source_id)
    }

    /// Whether the buffer renders to the empty string.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_owned()));
        }
    }

    /// Append free text (a manual edit at the end of the buffer).
    pub fn append_text(&mut self, text: &str) {
        self.push_text(text);
    }

    /// Append a blank-line separator and a block tagged `source_id`.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::DuplicateBlock`] if the tag is already
    /// present, or [`KnowledgeError::InvalidSourceId`] if it cannot be a
    /// marker token.
    pub fn append_block(
        &mut self,
        source_id: &str,
        source_name: &str,
        text: &str,
    ) -> Result<(), KnowledgeError> {
        validate_id(source_id)?;
        if self.contains_block(source_id) {
            return Err(KnowledgeError::DuplicateBlock(source_id.to_owned()));
        }
        self.push_text(BLOCK_SEPARATOR);
        self.segments
            .push(Segment::Block(KnowledgeBlock::new(source_id, source_name, text)));
        Ok(())
    }

    /// Remove every block tagged `source_id` together with the newlines right
    /// before it, then trim trailing whitespace. Text outside the removed
    /// spans is untouched. Returns `false` (and changes nothing) when no such
    /// block exists.
    pub fn remove_block(&mut self, source_id: &str) -> bool {
        if !self.contains_block(source_id) {
            return false;
        }

        let mut kept: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in std::mem::take(&mut self.segments) {
            match segment {
                Segment::Block(block) if block.source_id == source_id => {
                    if let Some(Segment::Text(prev)) = kept.last_mut() {
                        let trimmed_len = prev.trim_end_matches('\n').len();
                        prev.truncate(trimmed_len);
                        if prev.is_empty() {
                            kept.pop();
                        }
                    }
                }
                Segment::Text(text) => match kept.last_mut() {
                    Some(Segment::Text(prev)) => prev.push_str(&text),
                    _ => kept.push(Segment::Text(text)),
                },
                block @ Segment::Block(_) => kept.push(block),
            }
        }

        if let Some(Segment::Text(last)) = kept.last_mut() {
            let trimmed_len = last.trim_end().len();
            last.truncate(trimmed_len);
            if last.is_empty() {
                kept.pop();
            }
        }

        self.segments = kept;
        true
    }
}

impl fmt::Display for CompiledKnowledge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Append a block to a delimited buffer.
///
/// # Errors
///
/// See [`CompiledKnowledge::append_block`].
pub fn append_block(
    buffer: &str,
    source_id: &str,
    source_name: &str,
    text: &str,
) -> Result<String, KnowledgeError> {
    let mut knowledge = CompiledKnowledge::parse(buffer);
    knowledge.append_block(source_id, source_name, text)?;
    Ok(knowledge.render())
}

/// Remove a block from a delimited buffer. Unknown tags return the buffer
/// unchanged.
pub fn remove_block(buffer: &str, source_id: &str) -> String {
    let mut knowledge = CompiledKnowledge::parse(buffer);
    if knowledge.remove_block(source_id) {
        knowledge.render()
    } else {
        buffer.to_owned()
    }
}
