//! Original-format document loaders
//!
//! Loads upload formats into plain text parts without any Markdown
//! normalization. This is the path taken when conversion is disabled,
//! fails, or does not apply to the format.

use crate::docx;
use crate::errors::IngestionError;
use crate::pdf;
use tracing::debug;

/// Upload formats the pipeline understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Docx,
    Txt,
    Md,
    Csv,
}

impl SourceFormat {
    /// Parse a file extension (case-insensitive)
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "docx" => Some(SourceFormat::Docx),
            "txt" => Some(SourceFormat::Txt),
            "md" | "markdown" => Some(SourceFormat::Md),
            "csv" => Some(SourceFormat::Csv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Docx => "docx",
            SourceFormat::Txt => "txt",
            SourceFormat::Md => "md",
            SourceFormat::Csv => "csv",
        }
    }

    /// Binary formats that benefit from Markdown normalization
    pub fn benefits_from_conversion(&self) -> bool {
        matches!(self, SourceFormat::Pdf | SourceFormat::Docx)
    }
}

/// A loaded span of document text
///
/// Loaders that preserve pagination (PDF) emit one part per page so the
/// page number survives into chunk metadata.
#[derive(Debug, Clone)]
pub struct DocumentPart {
    pub text: String,
    pub page: Option<u32>,
}

/// Load document text in its original format
pub fn load_parts(bytes: &[u8], format: SourceFormat) -> Result<Vec<DocumentPart>, IngestionError> {
    let parts = match format {
        SourceFormat::Pdf => pdf::extract_pages(bytes)?
            .into_iter()
            .map(|page| DocumentPart {
                text: page.plain_text(),
                page: Some(page.number),
            })
            .filter(|part| !part.text.is_empty())
            .collect(),
        SourceFormat::Docx => vec![DocumentPart {
            text: docx::extract_text(bytes)?,
            page: None,
        }],
        SourceFormat::Txt | SourceFormat::Md | SourceFormat::Csv => vec![DocumentPart {
            text: String::from_utf8_lossy(bytes).into_owned(),
            page: None,
        }],
    };

    let parts: Vec<DocumentPart> = parts
        .into_iter()
        .filter(|part| !part.text.trim().is_empty())
        .collect();

    if parts.is_empty() {
        return Err(IngestionError::EmptyDocument);
    }

    debug!(
        format = format.as_str(),
        part_count = parts.len(),
        "Document loaded"
    );

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(SourceFormat::from_extension("PDF"), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_extension("markdown"), Some(SourceFormat::Md));
        assert_eq!(SourceFormat::from_extension("exe"), None);
    }

    #[test]
    fn test_conversion_applicability() {
        assert!(SourceFormat::Pdf.benefits_from_conversion());
        assert!(SourceFormat::Docx.benefits_from_conversion());
        assert!(!SourceFormat::Md.benefits_from_conversion());
    }

    #[test]
    fn test_load_plain_text() {
        let parts = load_parts(b"hello world", SourceFormat::Txt).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text, "hello world");
        assert_eq!(parts[0].page, None);
    }

    #[test]
    fn test_load_empty_text_is_error() {
        let err = load_parts(b"   \n  ", SourceFormat::Txt).unwrap_err();
        assert!(matches!(err, IngestionError::EmptyDocument));
    }

    #[test]
    fn test_load_docx_flat() {
        let bytes = crate::docx::build_test_docx(&[(Some(1), "Title"), (None, "Body.")]);
        let parts = load_parts(&bytes, SourceFormat::Docx).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].text.contains("Body."));
    }
}
