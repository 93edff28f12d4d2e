//! Document extraction
//!
//! Turns an uploaded document into ordered raw problem candidates. PDFs go
//! through an [`ExtractionBackend`]; when that backend cannot be reached the
//! extractor degrades to a local scan and marks the result low confidence.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoachError, CoachResult};

mod backend;
mod scan;
mod split;

pub use crate::domain::Confidence;
#[cfg(test)]
pub use backend::mock;
pub use backend::{CommandExtractor, ExtractionBackend, ExtractionError};
pub use split::numbered_line;

/// Document formats the extractor handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
}

impl DocumentFormat {
    /// Parse a declared MIME type or short format tag
    pub fn parse(tag: &str) -> CoachResult<Self> {
        let normalized = tag.trim().to_ascii_lowercase();
        let base = normalized.split(';').next().unwrap_or("").trim();
        match base {
            "application/pdf" | "pdf" => Ok(Self::Pdf),
            "text/plain" | "txt" | "text" => Ok(Self::PlainText),
            "text/markdown" | "text/x-markdown" | "md" | "markdown" => Ok(Self::Markdown),
            _ => Err(CoachError::UnsupportedFormat(tag.trim().to_string())),
        }
    }

    /// Guess the format tag from a file extension
    pub fn tag_for_path(path: &Path) -> String {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default()
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
            Self::Markdown => "text/markdown",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mime_type())
    }
}

/// Raw uploaded document
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    /// Declared MIME type or format tag, validated at extraction
    pub format: String,
    pub name: String,
}

impl Document {
    pub fn new(bytes: Vec<u8>, format: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bytes,
            format: format.into(),
            name: name.into(),
        }
    }
}

/// One problem's raw text as isolated from the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCandidate {
    /// Number printed in the source, if the text was numbered
    pub number: Option<u32>,
    pub text: String,
    /// 1-based page the candidate started on
    pub page: u32,
}

/// Result of extracting one document
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub format: DocumentFormat,
    pub candidates: Vec<RawCandidate>,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

/// Document extractor with a pluggable PDF backend
pub struct Extractor {
    backend: Arc<dyn ExtractionBackend>,
    repeated_line_min_occurrences: usize,
}

impl Extractor {
    pub fn new(backend: Arc<dyn ExtractionBackend>, repeated_line_min_occurrences: usize) -> Self {
        Self {
            backend,
            repeated_line_min_occurrences,
        }
    }

    /// Extract ordered problem candidates from a document
    pub async fn extract(&self, document: &Document) -> CoachResult<Extraction> {
        debug!(name = %document.name, format = %document.format, bytes = document.bytes.len(), "extract: called");
        let format = DocumentFormat::parse(&document.format)?;

        let mut warnings = Vec::new();
        let (text, confidence) = match format {
            DocumentFormat::PlainText => (String::from_utf8_lossy(&document.bytes).into_owned(), Confidence::High),
            DocumentFormat::Markdown => (
                markdown_to_text(&String::from_utf8_lossy(&document.bytes)),
                Confidence::High,
            ),
            DocumentFormat::Pdf => self.extract_pdf(document, &mut warnings).await?,
        };

        if text.trim().is_empty() {
            return Err(match format {
                DocumentFormat::Pdf => CoachError::ExtractionFailure("no usable text in the document".to_string()),
                _ => CoachError::EmptyDocument,
            });
        }

        let (candidates, removed) = split::split_candidates(&text, self.repeated_line_min_occurrences);
        if removed > 0 {
            debug!(removed, "extract: stripped repeated header/footer lines");
        }
        if candidates.is_empty() {
            return Err(CoachError::EmptyDocument);
        }

        info!(
            name = %document.name,
            candidates = candidates.len(),
            %confidence,
            "Extracted problem candidates"
        );
        Ok(Extraction {
            format,
            candidates,
            confidence,
            warnings,
        })
    }

    async fn extract_pdf(&self, document: &Document, warnings: &mut Vec<String>) -> CoachResult<(String, Confidence)> {
        match self.backend.extract_text(document).await {
            Ok(text) => Ok((text, Confidence::High)),
            Err(ExtractionError::Failed(reason)) => Err(CoachError::ExtractionFailure(reason)),
            Err(ExtractionError::Unavailable(reason)) => {
                warn!(%reason, "PDF converter unavailable, falling back to local text scan");
                let text = scan::scan_pdf(&document.bytes);
                if text.trim().is_empty() {
                    return Err(CoachError::ExtractionFailure(format!(
                        "{}; the local scan found no readable text",
                        reason
                    )));
                }
                warnings.push(format!(
                    "Text was read with a basic scan because the PDF converter was unavailable ({}). Some problems may be missing or garbled.",
                    reason
                ));
                Ok((text, Confidence::Low))
            }
        }
    }
}

/// Strip the markdown markup that would confuse problem splitting
fn markdown_to_text(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_start_matches('#').trim_start().replace("**", ""))
        .collect::<Vec<_>>()
        .join("\n")
}
