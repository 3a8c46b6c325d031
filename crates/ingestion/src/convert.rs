//! Markdown conversion stage
//!
//! Best-effort normalization of binary formats (PDF, DOCX) into
//! structure-preserving Markdown before chunking. Conversion runs on
//! the blocking pool under a bounded timeout, output is validated, and
//! every failure falls back to the original-format loader. Conversion
//! is never fatal to ingestion.

use crate::docx;
use crate::errors::IngestionError;
use crate::loader::{self, DocumentPart, SourceFormat};
use crate::pdf;
use docquery_common::config::IngestionConfig;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of the conversion stage
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// Text parts handed to the chunker
    pub parts: Vec<DocumentPart>,

    /// Original format, set only when Markdown conversion succeeded
    pub converted_from: Option<String>,
}

/// Convert to Markdown where it applies, falling back to the original
/// format on any failure (timeout, parse error, thin output)
pub async fn convert_with_fallback(
    bytes: &[u8],
    format: SourceFormat,
    config: &IngestionConfig,
) -> Result<ConversionOutcome, IngestionError> {
    let conversion_enabled = match format {
        SourceFormat::Pdf => config.convert_pdf,
        SourceFormat::Docx => config.convert_docx,
        _ => false,
    };

    if conversion_enabled {
        match try_convert(bytes.to_vec(), format, config).await {
            Ok(markdown) => {
                info!(
                    format = format.as_str(),
                    output_len = markdown.len(),
                    "Converted to Markdown"
                );
                return Ok(ConversionOutcome {
                    parts: vec![DocumentPart {
                        text: markdown,
                        page: None,
                    }],
                    converted_from: Some(format.as_str().to_string()),
                });
            }
            Err(e) => {
                warn!(
                    format = format.as_str(),
                    error = %e,
                    "Conversion failed, falling back to original format"
                );
            }
        }
    }

    let parts = loader::load_parts(bytes, format)?;
    Ok(ConversionOutcome {
        parts,
        converted_from: None,
    })
}

/// Run the blocking conversion under the configured timeout and
/// validate the output
async fn try_convert(
    bytes: Vec<u8>,
    format: SourceFormat,
    config: &IngestionConfig,
) -> Result<String, IngestionError> {
    let timeout = Duration::from_secs(config.convert_timeout_secs);
    let min_bytes = config.min_converted_bytes;

    let handle = tokio::task::spawn_blocking(move || convert_to_markdown(&bytes, format));

    let markdown = match tokio::time::timeout(timeout, handle).await {
        // The abandoned blocking task holds no handles; nothing was
        // written to the index yet, so timing out leaves no partial state
        Err(_) => {
            return Err(IngestionError::Conversion(format!(
                "timed out after {}s",
                timeout.as_secs()
            )))
        }
        Ok(Err(join_err)) => {
            return Err(IngestionError::Conversion(format!(
                "conversion task failed: {}",
                join_err
            )))
        }
        Ok(Ok(result)) => result?,
    };

    if markdown.trim().is_empty() {
        return Err(IngestionError::Conversion(
            "converted output is empty".to_string(),
        ));
    }
    if markdown.len() < min_bytes {
        return Err(IngestionError::Conversion(format!(
            "converted output too small ({} bytes, min {})",
            markdown.len(),
            min_bytes
        )));
    }

    Ok(markdown)
}

/// Synchronous conversion entry point
fn convert_to_markdown(bytes: &[u8], format: SourceFormat) -> Result<String, IngestionError> {
    match format {
        SourceFormat::Pdf => pdf_to_markdown(bytes),
        SourceFormat::Docx => docx::extract_markdown(bytes),
        other => Err(IngestionError::UnsupportedFormat(
            other.as_str().to_string(),
        )),
    }
}

/// PDF -> Markdown: text blocks become paragraphs, with a heading
/// heuristic for short title-like blocks
fn pdf_to_markdown(bytes: &[u8]) -> Result<String, IngestionError> {
    let pages = pdf::extract_pages(bytes)?;

    let mut out = String::new();
    for page in &pages {
        for block in &page.blocks {
            if block.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            if looks_like_heading(block) {
                out.push_str("## ");
            }
            out.push_str(block);
        }
    }

    debug!(page_count = pages.len(), output_len = out.len(), "PDF rendered as Markdown");
    Ok(out)
}

/// Heuristic: short block, no terminal punctuation, mostly uppercase or
/// section-numbered
fn looks_like_heading(block: &str) -> bool {
    let trimmed = block.trim();
    if trimmed.is_empty() || trimmed.len() > 80 {
        return false;
    }
    if trimmed.ends_with(['.', ',', ';', ':']) {
        return false;
    }

    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    let upper_ratio =
        letters.iter().filter(|c| c.is_uppercase()).count() as f32 / letters.len() as f32;

    upper_ratio > 0.7 || starts_with_section_number(trimmed)
}

/// Matches prefixes like "1." / "3)" / "2.4"
fn starts_with_section_number(text: &str) -> bool {
    let mut saw_digit = false;
    for ch in text.chars() {
        match ch {
            c if c.is_ascii_digit() => saw_digit = true,
            '.' | ')' if saw_digit => return true,
            _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> IngestionConfig {
        IngestionConfig {
            min_converted_bytes: 10,
            ..IngestionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_docx_converts_to_markdown() {
        let bytes = docx::build_test_docx(&[
            (Some(1), "Expense Policy"),
            (None, "Receipts are required for all claims over fifty dollars."),
        ]);

        let outcome = convert_with_fallback(&bytes, SourceFormat::Docx, &test_config())
            .await
            .unwrap();

        assert_eq!(outcome.converted_from.as_deref(), Some("docx"));
        assert_eq!(outcome.parts.len(), 1);
        assert!(outcome.parts[0].text.contains("# Expense Policy"));
    }

    #[tokio::test]
    async fn test_thin_output_falls_back_to_original() {
        let bytes = docx::build_test_docx(&[
            (Some(1), "Expense Policy"),
            (None, "Receipts are required for all claims."),
        ]);

        let config = IngestionConfig {
            min_converted_bytes: 100_000,
            ..IngestionConfig::default()
        };

        let outcome = convert_with_fallback(&bytes, SourceFormat::Docx, &config)
            .await
            .unwrap();

        // Fallback loads the original flat text; no conversion recorded
        assert!(outcome.converted_from.is_none());
        assert!(!outcome.parts[0].text.contains('#'));
        assert!(outcome.parts[0].text.contains("Receipts are required"));
    }

    #[tokio::test]
    async fn test_disabled_conversion_uses_loader() {
        let bytes = docx::build_test_docx(&[(None, "Plain paragraph.")]);
        let config = IngestionConfig {
            convert_docx: false,
            ..IngestionConfig::default()
        };

        let outcome = convert_with_fallback(&bytes, SourceFormat::Docx, &config)
            .await
            .unwrap();
        assert!(outcome.converted_from.is_none());
    }

    #[tokio::test]
    async fn test_text_formats_pass_through() {
        let outcome = convert_with_fallback(
            b"# Already markdown\n\nBody.",
            SourceFormat::Md,
            &test_config(),
        )
        .await
        .unwrap();

        assert!(outcome.converted_from.is_none());
        assert_eq!(outcome.parts.len(), 1);
    }

    #[tokio::test]
    async fn test_unloadable_bytes_still_error_after_fallback() {
        let err = convert_with_fallback(b"garbage", SourceFormat::Pdf, &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::PdfParse(_)));
    }

    #[test]
    fn test_heading_heuristic() {
        assert!(looks_like_heading("QUARTERLY RESULTS"));
        assert!(looks_like_heading("1. Introduction"));
        assert!(!looks_like_heading("This is a normal sentence."));
        assert!(!looks_like_heading(""));
    }
}
