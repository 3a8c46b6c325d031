//! DOCX text extraction
//!
//! Reads `word/document.xml` out of the OOXML zip container and walks
//! the XML events. Paragraph heading styles (Heading1..Heading9) are
//! preserved so the Markdown rendering keeps document structure.

use crate::errors::IngestionError;
use std::io::Read;

/// Maximum decompressed bytes read from a zip entry (zip-bomb protection)
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// A paragraph with its heading level, if the paragraph is styled as one
#[derive(Debug, Clone)]
struct Paragraph {
    heading_level: Option<u8>,
    text: String,
}

/// Extract DOCX content as Markdown (heading styles become `#` headers)
pub fn extract_markdown(bytes: &[u8]) -> Result<String, IngestionError> {
    let paragraphs = read_paragraphs(bytes)?;

    let mut out = String::new();
    for para in &paragraphs {
        if para.text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        if let Some(level) = para.heading_level {
            for _ in 0..level {
                out.push('#');
            }
            out.push(' ');
        }
        out.push_str(&para.text);
    }

    Ok(out)
}

/// Extract DOCX content as flat text (no structure markers)
pub fn extract_text(bytes: &[u8]) -> Result<String, IngestionError> {
    let paragraphs = read_paragraphs(bytes)?;

    Ok(paragraphs
        .iter()
        .filter(|p| !p.text.is_empty())
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn read_paragraphs(bytes: &[u8]) -> Result<Vec<Paragraph>, IngestionError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| IngestionError::DocxParse(e.to_string()))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| IngestionError::DocxParse("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| IngestionError::DocxParse(e.to_string()))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(IngestionError::DocxParse(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    parse_paragraphs(&doc_xml)
}

fn parse_paragraphs(xml: &[u8]) -> Result<Vec<Paragraph>, IngestionError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut paragraphs = Vec::new();
    let mut buf = Vec::new();

    let mut current = String::new();
    let mut heading_level: Option<u8> = None;
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    current.clear();
                    heading_level = None;
                }
                b"pStyle" => {
                    heading_level = style_attr(&e).and_then(|s| heading_level_of(&s));
                }
                b"t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"pStyle" => {
                    heading_level = style_attr(&e).and_then(|s| heading_level_of(&s));
                }
                b"br" | b"tab" => {
                    if !current.is_empty() && !current.ends_with(' ') {
                        current.push(' ');
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_text_run => {
                current.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    paragraphs.push(Paragraph {
                        heading_level,
                        text: current.trim().to_string(),
                    });
                    current.clear();
                    heading_level = None;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(IngestionError::DocxParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// Read the `w:val` attribute of a pStyle element
fn style_attr(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"val")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Map a paragraph style name to a Markdown heading level
fn heading_level_of(style: &str) -> Option<u8> {
    let digits = style.strip_prefix("Heading")?;
    let level: u8 = digits.parse().ok()?;
    if (1..=9).contains(&level) {
        // Markdown only goes to six levels
        Some(level.min(6))
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) fn build_test_docx(paragraphs: &[(Option<u8>, &str)]) -> Vec<u8> {
    use std::io::Write;

    let mut body = String::new();
    for (level, text) in paragraphs {
        body.push_str("<w:p>");
        if let Some(level) = level {
            body.push_str(&format!(
                "<w:pPr><w:pStyle w:val=\"Heading{}\"/></w:pPr>",
                level
            ));
        }
        body.push_str(&format!("<w:r><w:t>{}</w:t></w:r>", text));
        body.push_str("</w:p>");
    }
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    );

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}
