//! Document text extraction.
//!
//! Word and spreadsheet files are zip packages of XML parts; the text is
//! pulled from `word/document.xml` and from the first worksheet respectively.
//! PDFs are not parsed locally: the bytes are base64-encoded and handed to the
//! summarizer as inline data, which extracts and summarizes in one call.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use base64::Engine;
use regex::Regex;

use super::source::SourceKind;

/// Message stored on a source whose extraction failed.
pub const EXTRACTION_FAILED: &str = "Failed to process file";

/// MIME type used for inline PDF payloads.
pub const PDF_MIME: &str = "application/pdf";

/// Extraction errors. All of them end up as [`EXTRACTION_FAILED`] on the
/// source; the detail is only logged.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The file is not a readable zip package.
    #[error("invalid document package: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Reading a package entry failed.
    #[error("failed to read document part: {0}")]
    Io(#[from] std::io::Error),
    /// A required XML part is missing.
    #[error("document part '{0}' not found")]
    MissingPart(String),
    /// Internal pattern failed to compile.
    #[error("extraction pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// What the summarizer receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedContent {
    /// Extracted plain text.
    Text(String),
    /// Raw bytes for the oracle to read itself.
    Inline {
        /// MIME type.
        mime_type: String,
        /// Base64-encoded bytes.
        data: String,
    },
}

/// Extract content from an uploaded file of the given kind.
///
/// # Errors
///
/// Returns [`ExtractError`] when a Word or spreadsheet package cannot be
/// decoded. PDF and plain text never fail.
pub fn extract(kind: SourceKind, bytes: &[u8]) -> Result<ExtractedContent, ExtractError> {
    match kind {
        SourceKind::DocumentPdf => Ok(ExtractedContent::Inline {
            mime_type: PDF_MIME.to_owned(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }),
        SourceKind::DocumentWord => extract_docx(bytes).map(ExtractedContent::Text),
        SourceKind::DocumentSpreadsheet => extract_xlsx(bytes).map(ExtractedContent::Text),
        SourceKind::PlainText | SourceKind::Link | SourceKind::SectorReference => Ok(
            ExtractedContent::Text(String::from_utf8_lossy(bytes).into_owned()),
        ),
    }
}

// ---------------------------------------------------------------------------
// Package helpers
// ---------------------------------------------------------------------------

fn read_part(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(Some(contents))
}

fn unescape_xml(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    let numeric = Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);");
    let decoded = match numeric {
        Ok(re) => re
            .replace_all(raw, |caps: &regex::Captures<'_>| {
                let code = &caps[1];
                let parsed = match code.strip_prefix('x') {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => code.parse::<u32>().ok(),
                };
                parsed
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default()
            })
            .into_owned(),
        Err(_) => raw.to_owned(),
    };
    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Word
// ---------------------------------------------------------------------------

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let xml = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| ExtractError::MissingPart("word/document.xml".to_owned()))?;

    // Runs, tabs and breaks in document order.
    let token = Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab/>|<w:br/>|</w:p>")?;

    let mut text = String::new();
    for caps in token.captures_iter(&xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&unescape_xml(run.as_str())),
            None => match caps.get(0).map(|m| m.as_str()) {
                Some("<w:tab/>") => text.push('\t'),
                _ => text.push('\n'),
            },
        }
    }
    Ok(text.trim_end().to_owned())
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let shared = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet_path = first_sheet_path(&mut archive)?;
    let sheet = read_part(&mut archive, &sheet_path)?
        .ok_or_else(|| ExtractError::MissingPart(sheet_path.clone()))?;
    sheet_to_csv(&sheet, &shared)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ExtractError> {
    let item = Regex::new(r"(?s)<si>(.*?)</si>")?;
    let text = Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>")?;
    Ok(item
        .captures_iter(xml)
        .map(|si| {
            text.captures_iter(&si[1])
                .map(|t| unescape_xml(&t[1]))
                .collect::<String>()
        })
        .collect())
}

/// Path of the first sheet listed in the workbook, via its relationship id.
/// Falls back to `xl/worksheets/sheet1.xml`.
fn first_sheet_path(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
) -> Result<String, ExtractError> {
    const FALLBACK: &str = "xl/worksheets/sheet1.xml";

    let Some(workbook) = read_part(archive, "xl/workbook.xml")? else {
        return Ok(FALLBACK.to_owned());
    };
    let sheet = Regex::new(r#"<sheet\s[^>]*r:id="([^"]+)""#)?;
    let Some(rel_id) = sheet.captures(&workbook).map(|c| c[1].to_owned()) else {
        return Ok(FALLBACK.to_owned());
    };
    let Some(rels) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(FALLBACK.to_owned());
    };

    let relationship = Regex::new(r"<Relationship\s[^>]*>")?;
    let attr = Regex::new(r#"(\w+)="([^"]*)""#)?;
    for rel in relationship.find_iter(&rels) {
        let attrs: HashMap<&str, &str> = attr
            .captures_iter(rel.as_str())
            .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
            .collect();
        if attrs.get("Id") == Some(&rel_id.as_str()) {
            if let Some(target) = attrs.get("Target") {
                let target = target.trim_start_matches('/');
                return Ok(if target.starts_with("xl/") {
                    target.to_owned()
                } else {
                    format!("xl/{target}")
                });
            }
        }
    }
    Ok(FALLBACK.to_owned())
}

/// Zero-based column index from a cell reference like `AB12`.
fn column_index(cell_ref: &str) -> Option<usize> {
    let mut index: usize = 0;
    let mut any = false;
    for c in cell_ref.chars().take_while(char::is_ascii_alphabetic) {
        let digit = usize::from(u8::try_from(c.to_ascii_uppercase()).ok()?.checked_sub(b'A')?);
        index = index.checked_mul(26)?.checked_add(digit.checked_add(1)?)?;
        any = true;
    }
    if any {
        index.checked_sub(1)
    } else {
        None
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn sheet_to_csv(xml: &str, shared: &[String]) -> Result<String, ExtractError> {
    let row = Regex::new(r"(?s)<row(?:\s[^>]*)?>(.*?)</row>")?;
    let cell = Regex::new(r"(?s)<c(\s[^>]*?)?(?:/>|>(.*?)</c>)")?;
    let attr = Regex::new(r#"(\w+)="([^"]*)""#)?;
    let value = Regex::new(r"(?s)<v>(.*?)</v>")?;
    let inline = Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>")?;

    let mut lines = Vec::new();
    for row_caps in row.captures_iter(xml) {
        let mut fields: Vec<String> = Vec::new();
        for cell_caps in cell.captures_iter(&row_caps[1]) {
            let attrs: HashMap<&str, &str> = cell_caps
                .get(1)
                .map(|m| {
                    attr.captures_iter(m.as_str())
                        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
                        .collect()
                })
                .unwrap_or_default();
            let inner = cell_caps.get(2).map(|m| m.as_str()).unwrap_or("");

            let raw = value.captures(inner).map(|c| c[1].to_owned());
            let text = match (attrs.get("t").copied(), raw) {
                (Some("s"), Some(idx)) => idx
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| shared.get(i).cloned())
                    .unwrap_or_default(),
                (Some("inlineStr"), _) => inline
                    .captures_iter(inner)
                    .map(|t| unescape_xml(&t[1]))
                    .collect(),
                (_, Some(v)) => unescape_xml(&v),
                (_, None) => String::new(),
            };

            let position = attrs
                .get("r")
                .and_then(|r| column_index(r))
                .unwrap_or(fields.len());
            if position > fields.len() {
                fields.resize(position, String::new());
            }
            fields.push(text);
        }
        lines.push(
            fields
                .iter()
                .map(|f| csv_field(f))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    Ok(lines.join("\n"))
}
