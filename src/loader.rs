//! Document loading and text extraction.
//!
//! Turns raw uploaded bytes into a [`LoadedDocument`] ready for chunking.
//! Format is chosen by file extension: plain text and Markdown are read
//! whole, PDFs go through a two-pass extraction with an OCR-required
//! rejection, and DOCX files are unzipped and mined for `<w:t>` runs.
//! Extraction never panics on corrupt input; it returns a descriptive error
//! and the caller skips the file.

use std::io::Read;

use chrono::Utc;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::models::LoadedDocument;

/// File extensions accepted for upload and indexing.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["txt", "md", "pdf", "docx"];

/// A PDF whose primary and secondary extraction passes both yield at most
/// this many non-whitespace characters is treated as scanned (OCR required).
const MIN_PDF_TEXT_CHARS: usize = 50;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Lowercased extension of `file_name`, if any.
pub fn extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Whether the file's extension is one of [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(file_name: &str) -> bool {
    extension(file_name)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Extract plain text from `bytes` according to the file's extension.
///
/// # Errors
///
/// - [`RagError::EmptyDocument`] for zero-byte input or empty extraction
/// - [`RagError::UnsupportedFormat`] for unknown extensions
/// - [`RagError::OcrRequired`] for PDFs with no machine-readable text layer
/// - [`RagError::Extraction`] for corrupt or truncated input
pub fn load_document(file_name: &str, bytes: &[u8]) -> Result<LoadedDocument> {
    if bytes.is_empty() {
        return Err(RagError::EmptyDocument(file_name.to_string()));
    }

    let ext = extension(file_name)
        .ok_or_else(|| RagError::UnsupportedFormat(file_name.to_string()))?;

    let text = match ext.as_str() {
        "txt" | "md" => String::from_utf8_lossy(bytes).into_owned(),
        "pdf" => extract_pdf(file_name, bytes)?,
        "docx" => extract_docx(file_name, bytes)?,
        _ => return Err(RagError::UnsupportedFormat(file_name.to_string())),
    };

    if text.trim().is_empty() {
        return Err(RagError::EmptyDocument(file_name.to_string()));
    }

    let content_length = text.chars().count();
    debug!(
        file = file_name,
        bytes = bytes.len(),
        chars = content_length,
        "document loaded"
    );

    Ok(LoadedDocument {
        source: file_name.to_string(),
        text,
        file_size: bytes.len() as u64,
        content_length,
        loaded_at: Utc::now(),
    })
}

fn non_whitespace_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Two-pass PDF extraction.
///
/// The primary pass uses `pdf-extract`; when it fails or yields almost no
/// text, a secondary per-page pass with `lopdf` is tried. A PDF that parses
/// but yields ≤ [`MIN_PDF_TEXT_CHARS`] non-whitespace characters from both
/// passes is treated as scanned and rejected as OCR-required.
fn extract_pdf(file_name: &str, bytes: &[u8]) -> Result<String> {
    let primary = pdf_extract::extract_text_from_mem(bytes);

    if let Ok(text) = &primary {
        if non_whitespace_chars(text) > MIN_PDF_TEXT_CHARS {
            return Ok(text.clone());
        }
    }

    let secondary = extract_pdf_lopdf(bytes);

    match (primary, secondary) {
        (_, Ok(text)) if non_whitespace_chars(&text) > MIN_PDF_TEXT_CHARS => Ok(text),
        // At least one pass parsed the file, but neither found a usable
        // text layer.
        (Ok(_), _) | (_, Ok(_)) => Err(RagError::OcrRequired {
            file: file_name.to_string(),
        }),
        (Err(e), Err(_)) => Err(RagError::Extraction {
            file: file_name.to_string(),
            message: e.to_string(),
        }),
    }
}

fn extract_pdf_lopdf(bytes: &[u8]) -> std::result::Result<String, lopdf::Error> {
    let doc = lopdf::Document::load_mem(bytes)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages)
}

fn extract_docx(file_name: &str, bytes: &[u8]) -> Result<String> {
    let ooxml_err = |e: String| RagError::Extraction {
        file: file_name.to_string(),
        message: e,
    };

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ooxml_err(e.to_string()))?;
    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| ooxml_err(e.to_string()))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| ooxml_err(e.to_string()))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(ooxml_err("word/document.xml exceeds size limit".to_string()));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(ooxml_err("word/document.xml not found".to_string()));
    }
    extract_w_t_elements(&doc_xml).map_err(ooxml_err)
}

/// Collect the text content of all `<w:t>` elements, separating runs with
/// spaces so adjacent paragraphs don't fuse into one word.
fn extract_w_t_elements(xml: &[u8]) -> std::result::Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if !out.is_empty() {
                            out.push(' ');
                        }
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
