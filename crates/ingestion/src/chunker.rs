//! Structure-aware text chunking
//!
//! Markdown headers define section boundaries; the open-header
//! breadcrumb is attached to every chunk so retrieval can show which
//! section a passage came from. Within a section, text is split
//! recursively (paragraph, then sentence, word, character) with
//! configured size and overlap.

use crate::errors::IngestionError;
use crate::loader::DocumentPart;
use docquery_common::config::ChunkingConfig;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// A chunk ready for embedding, with propagated section metadata
#[derive(Debug, Clone)]
pub struct DocChunk {
    /// The chunk content
    pub content: String,

    /// Index of this chunk within the document
    pub index: usize,

    /// Approximate token count (~4 chars per token)
    pub token_count: usize,

    /// Header breadcrumb from the document root to this chunk's section
    pub section_path: Vec<String>,

    /// Level of the deepest enclosing header (1-6)
    pub header_level: Option<u8>,

    /// Source page, when the loader preserved pagination
    pub page: Option<u32>,
}

/// A contiguous span of text under one header breadcrumb
#[derive(Debug)]
struct Section {
    path: Vec<String>,
    level: Option<u8>,
    text: String,
}

/// Split loaded document parts into overlapping chunks
pub fn chunk_document(
    parts: &[DocumentPart],
    config: &ChunkingConfig,
) -> Result<Vec<DocChunk>, IngestionError> {
    let chunk_config = ChunkConfig::new(config.chunk_size)
        .with_overlap(config.chunk_overlap)
        .map_err(|e| IngestionError::Chunking(e.to_string()))?;
    let splitter = TextSplitter::new(chunk_config);

    let mut chunks = Vec::new();

    for part in parts {
        for section in split_sections(&part.text) {
            for piece in splitter.chunks(&section.text) {
                if piece.len() < config.min_chunk_size {
                    continue;
                }
                chunks.push(DocChunk {
                    content: piece.to_string(),
                    index: 0,
                    token_count: piece.len() / 4,
                    section_path: section.path.clone(),
                    header_level: section.level,
                    page: part.page,
                });
            }
        }
    }

    // Assign contiguous indices after min-size filtering
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.index = i;
    }

    debug!(
        part_count = parts.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        "Document chunked"
    );

    Ok(chunks)
}

/// Split text at Markdown header boundaries, tracking the breadcrumb
/// of open headers
fn split_sections(text: &str) -> Vec<Section> {
    fn flush(sections: &mut Vec<Section>, stack: &[(u8, String)], current: &mut String) {
        if current.trim().is_empty() {
            current.clear();
            return;
        }
        sections.push(Section {
            path: stack.iter().map(|(_, title)| title.clone()).collect(),
            level: stack.last().map(|(level, _)| *level),
            text: std::mem::take(current),
        });
    }

    let mut sections = Vec::new();
    // Stack of (level, title) for currently open headers
    let mut stack: Vec<(u8, String)> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if let Some((level, title)) = parse_header(line) {
            flush(&mut sections, &stack, &mut current);

            while stack.last().map(|(l, _)| *l >= level).unwrap_or(false) {
                stack.pop();
            }
            stack.push((level, title));

            // Keep the header line in its section so the title is
            // retrievable text too
            current.push_str(line);
            current.push('\n');
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    flush(&mut sections, &stack, &mut current);

    sections
}

/// Parse an ATX header line: 1-6 `#` characters followed by a space
fn parse_header(line: &str) -> Option<(u8, String)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim();
    if title.is_empty() {
        return None;
    }
    Some((hashes as u8, title.to_string()))
}
