use lopdf::{content::Content, Document, Object, ObjectId};
use tracing;

use super::{ExtractedText, ExtractionError, ExtractionMethod, PdfTextExtractor};

/// lopdf-backed extractor with a size guard and a two-method cascade:
/// the library's built-in text extraction first, then a manual scan of the
/// page content streams for files it cannot handle.
pub struct LopdfExtractor {
    max_file_size: usize,
}

impl LopdfExtractor {
    pub fn new(max_size_mb: usize) -> Self {
        Self {
            max_file_size: max_size_mb * 1024 * 1024,
        }
    }
}

impl PdfTextExtractor for LopdfExtractor {
    fn extract(&self, pdf_bytes: &[u8], filename: &str) -> Result<ExtractedText, ExtractionError> {
        if pdf_bytes.len() > self.max_file_size {
            tracing::warn!(filename, size = pdf_bytes.len(), "PDF exceeds maximum size");
            return Err(ExtractionError::FileTooLarge {
                size: pdf_bytes.len(),
                max: self.max_file_size,
            });
        }

        let doc = Document::load_mem(pdf_bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;
        let pages = doc.get_pages();
        let page_count = pages.len();

        let text = extract_builtin(&doc, &pages);
        if let Some(text) = text {
            tracing::debug!(filename, page_count, "Extracted text via built-in method");
            return Ok(ExtractedText {
                text,
                method: ExtractionMethod::PdfText,
                page_count,
            });
        }

        let text = extract_content_stream(&doc, &pages);
        if let Some(text) = text {
            tracing::debug!(filename, page_count, "Extracted text via content-stream scan");
            return Ok(ExtractedText {
                text,
                method: ExtractionMethod::ContentStream,
                page_count,
            });
        }

        tracing::error!(filename, "All extraction methods failed");
        Err(ExtractionError::NoText)
    }
}

fn extract_builtin(
    doc: &Document,
    pages: &std::collections::BTreeMap<u32, ObjectId>,
) -> Option<String> {
    let mut parts = Vec::new();
    for &page_num in pages.keys() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) if !page_text.trim().is_empty() => {
                parts.push(format!("--- Page {page_num} ---\n{page_text}"));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(page = page_num, error = %e, "Built-in extraction failed for page");
            }
        }
    }
    finish(parts)
}

fn extract_content_stream(
    doc: &Document,
    pages: &std::collections::BTreeMap<u32, ObjectId>,
) -> Option<String> {
    let mut parts = Vec::new();
    for (&page_num, &page_id) in pages {
        match page_text_from_content(doc, page_id) {
            Ok(page_text) if !page_text.trim().is_empty() => {
                parts.push(format!("--- Page {page_num} ---\n{page_text}"));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(page = page_num, error = %e, "Content-stream scan failed for page");
            }
        }
    }
    finish(parts)
}

fn finish(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    let cleaned = clean_text(&parts.join("\n\n"));
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Walk the page's content stream collecting text-showing operators.
fn page_text_from_content(doc: &Document, page_id: ObjectId) -> Result<String, ExtractionError> {
    let content_bytes = doc
        .get_page_content(page_id)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    let content = Content::decode(&content_bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let mut text = String::new();
    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tj" | "TJ" | "'" | "\"" => {
                for operand in &operation.operands {
                    if let Some(s) = string_from_object(operand) {
                        text.push_str(&s);
                        text.push(' ');
                    }
                }
            }
            "Td" | "TD" | "T*" => {
                if !text.ends_with('\n') && !text.ends_with(' ') {
                    text.push('\n');
                }
            }
            _ => {}
        }
    }
    Ok(text)
}

fn string_from_object(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => {
            // UTF-16BE BOM first, then Latin-1 / PDFDocEncoding
            if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
                let utf16: Vec<u16> = bytes[2..]
                    .chunks(2)
                    .filter(|chunk| chunk.len() == 2)
                    .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                    .collect();
                String::from_utf16(&utf16).ok()
            } else {
                Some(bytes.iter().map(|&b| b as char).collect())
            }
        }
        Object::Array(arr) => {
            let mut result = String::new();
            for item in arr {
                if let Some(s) = string_from_object(item) {
                    result.push_str(&s);
                }
            }
            if result.is_empty() {
                None
            } else {
                Some(result)
            }
        }
        _ => None,
    }
}

/// Normalize whitespace within lines and drop empty ones so downstream
/// section matching is not thrown off by layout artifacts.
fn clean_text(text: &str) -> String {
    let mut lines = Vec::new();
    for line in text.lines() {
        let normalized = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !normalized.is_empty() {
            lines.push(normalized);
        }
    }
    lines.join("\n")
}
