//! PDF text extraction
//!
//! Extracts text from PDF content streams (text between BT/ET
//! operators). Output is grouped per page, and within a page per text
//! block, so downstream stages can keep page metadata and apply
//! structure heuristics.

use crate::errors::IngestionError;
use tracing::{debug, warn};

/// Text of a single page, as a list of text blocks in stream order
#[derive(Debug, Clone)]
pub struct PdfPage {
    pub number: u32,
    pub blocks: Vec<String>,
}

impl PdfPage {
    /// Page text with blocks joined by spaces and whitespace collapsed
    pub fn plain_text(&self) -> String {
        self.blocks
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Extract text from PDF bytes, one entry per page
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<PdfPage>, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| IngestionError::PdfParse(format!("Failed to load PDF: {}", e)))?;

    let mut pages = Vec::new();

    for (idx, page_id) in doc.page_iter().enumerate() {
        let number = idx as u32 + 1;
        match doc.get_page_content(page_id) {
            Ok(content) => {
                let blocks = blocks_from_content(&content);
                pages.push(PdfPage { number, blocks });
            }
            Err(e) => {
                warn!(page = number, error = %e, "Failed to read page content, skipping");
            }
        }
    }

    let total_len: usize = pages
        .iter()
        .flat_map(|p| p.blocks.iter())
        .map(|b| b.len())
        .sum();

    if total_len == 0 {
        return Err(IngestionError::PdfParse(
            "No text content extracted from PDF".to_string(),
        ));
    }

    debug!(
        page_count = pages.len(),
        text_len = total_len,
        "PDF text extraction complete"
    );

    Ok(pages)
}

/// Split a content stream into text blocks (one per BT/ET pair)
fn blocks_from_content(content: &[u8]) -> Vec<String> {
    let content_str = String::from_utf8_lossy(content);
    let mut blocks = Vec::new();
    let mut in_text_block = false;
    let mut current = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            let block = current.split_whitespace().collect::<Vec<_>>().join(" ");
            if !block.is_empty() {
                blocks.push(block);
            }
            current.clear();
            continue;
        }

        if in_text_block {
            if let Some(text) = operator_text(trimmed) {
                current.push_str(&text);
                current.push(' ');
            }
        }
    }

    blocks
}

/// Extract the text argument of a text-showing operator (Tj, TJ, ', ")
fn operator_text(line: &str) -> Option<String> {
    // (text) Tj and the single-quote / double-quote variants
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
            if start < end {
                return Some(decode_literal(&line[start + 1..end]));
            }
        }
    }

    // [(text) num (text) num] TJ
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' if !in_paren => in_paren = true,
                ')' if in_paren => {
                    in_paren = false;
                    result.push_str(&decode_literal(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }

        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Decode PDF literal-string escapes
fn decode_literal(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('(') => result.push('('),
                Some(')') => result.push(')'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}
