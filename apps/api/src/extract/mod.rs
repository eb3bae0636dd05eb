//! Résumé text extraction: turns an uploaded document into plain text.
//!
//! PDF goes through `pdf-extract` on a blocking thread; plain text and
//! markdown are decoded as UTF-8. Failures carry the extractor-native kinds
//! `INVALID_INPUT`, `INVALID_PDF`, `UNREADABLE` and `EMPTY_CONTENT`.

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{ErrorKind, PipelineError};
use crate::models::SourceFormat;
use crate::pipeline::request::ResumeDocument;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: u32,
    pub format: SourceFormat,
}

#[async_trait]
pub trait ResumeExtractor: Send + Sync {
    async fn extract_text(&self, document: &ResumeDocument) -> Result<ExtractedText, PipelineError>;
}

/// Default extractor for PDF, plain-text and markdown uploads.
pub struct DocumentTextExtractor;

#[async_trait]
impl ResumeExtractor for DocumentTextExtractor {
    async fn extract_text(&self, document: &ResumeDocument) -> Result<ExtractedText, PipelineError> {
        let format = detect_format(document)?;
        debug!(
            "Extracting {:?} document ({} bytes)",
            format,
            document.bytes.len()
        );

        let (raw, page_count) = match format {
            SourceFormat::Pdf => {
                if !document.bytes.starts_with(PDF_MAGIC) {
                    return Err(PipelineError::new(
                        ErrorKind::InvalidPdf,
                        "The uploaded file is not a valid PDF document",
                    ));
                }
                let bytes = document.bytes.clone();
                let page_count = count_pdf_pages(&bytes);
                let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                    .await
                    .map_err(|e| {
                        PipelineError::new(
                            ErrorKind::Unreadable,
                            format!("PDF parser aborted: {e}"),
                        )
                    })?
                    .map_err(|e| {
                        PipelineError::new(
                            ErrorKind::Unreadable,
                            format!("Could not read text from PDF: {e}"),
                        )
                    })?;
                (text, page_count)
            }
            SourceFormat::Text | SourceFormat::Markdown => {
                let text = std::str::from_utf8(&document.bytes)
                    .map_err(|e| {
                        PipelineError::new(
                            ErrorKind::Unreadable,
                            format!("Document is not valid UTF-8 text: {e}"),
                        )
                    })?
                    .to_string();
                (text, 1)
            }
        };

        let text = normalize_text(&raw);
        if text.is_empty() {
            return Err(PipelineError::new(
                ErrorKind::EmptyContent,
                "No text could be extracted from the document",
            ));
        }

        Ok(ExtractedText {
            text,
            page_count,
            format,
        })
    }
}

/// Detects the document format from magic bytes, then content type, then
/// file extension.
pub fn detect_format(document: &ResumeDocument) -> Result<SourceFormat, PipelineError> {
    if document.bytes.starts_with(PDF_MAGIC) {
        return Ok(SourceFormat::Pdf);
    }

    let content_type = document
        .content_type
        .as_deref()
        .map(|c| c.to_lowercase())
        .unwrap_or_default();
    let extension = document
        .file_name
        .as_deref()
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    if content_type == "application/pdf" || extension == "pdf" {
        return Ok(SourceFormat::Pdf);
    }
    if content_type == "text/markdown" || matches!(extension.as_str(), "md" | "markdown") {
        return Ok(SourceFormat::Markdown);
    }
    if content_type.starts_with("text/") || extension == "txt" {
        return Ok(SourceFormat::Text);
    }
    if content_type.is_empty() && extension.is_empty() {
        // Untyped upload: accept it as text if it decodes.
        if std::str::from_utf8(&document.bytes).is_ok() {
            return Ok(SourceFormat::Text);
        }
    }

    Err(PipelineError::new(
        ErrorKind::InvalidInput,
        format!(
            "Unsupported document type (content type '{content_type}', extension '{extension}'); upload a PDF, TXT or Markdown file"
        ),
    ))
}

/// Counts page objects (`/Type /Page`, not `/Pages`) in the raw PDF bytes.
/// Always at least 1.
fn count_pdf_pages(bytes: &[u8]) -> u32 {
    let mut count = 0u32;
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];
        let matched = if rest.starts_with(b"/Type /Page") {
            Some(b"/Type /Page".len())
        } else if rest.starts_with(b"/Type/Page") {
            Some(b"/Type/Page".len())
        } else {
            None
        };
        match matched {
            Some(len) => {
                if bytes.get(i + len) != Some(&b's') {
                    count += 1;
                }
                i += len;
            }
            None => i += 1,
        }
    }
    count.max(1)
}

/// Trims trailing whitespace per line and collapses runs of blank lines.
fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
