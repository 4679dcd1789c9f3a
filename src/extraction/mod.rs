//! PDF text extraction.
//!
//! The rest of the pipeline only ever sees extracted plain text; this
//! module is the seam behind which the PDF library lives. Extraction tries
//! lopdf's built-in text extraction first and falls back to a manual
//! content-stream scan for documents it chokes on.

pub mod lopdf_extractor;
pub mod validate;

pub use lopdf_extractor::LopdfExtractor;
pub use validate::{check_medical_content, ContentCheck};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("PDF of {size} bytes exceeds maximum of {max} bytes")]
    FileTooLarge { size: usize, max: usize },

    #[error("PDF parsing failed: {0}")]
    Pdf(String),

    #[error("All extraction methods produced no text")]
    NoText,
}

/// How the text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    PdfText,
    ContentStream,
}

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub method: ExtractionMethod,
    pub page_count: usize,
}

/// Seam for PDF-to-text. The pipeline depends on this trait, never on the
/// PDF library directly, so tests substitute a canned implementation.
pub trait PdfTextExtractor: Send + Sync {
    fn extract(&self, pdf_bytes: &[u8], filename: &str) -> Result<ExtractedText, ExtractionError>;
}

/// Canned extractor for tests: returns a fixed text or a fixed failure.
pub struct MockExtractor {
    result: Result<String, String>,
}

impl MockExtractor {
    pub fn returning(text: &str) -> Self {
        Self { result: Ok(text.to_string()) }
    }

    pub fn failing(reason: &str) -> Self {
        Self { result: Err(reason.to_string()) }
    }
}

impl PdfTextExtractor for MockExtractor {
    fn extract(&self, _pdf_bytes: &[u8], _filename: &str) -> Result<ExtractedText, ExtractionError> {
        match &self.result {
            Ok(text) => Ok(ExtractedText {
                text: text.clone(),
                method: ExtractionMethod::PdfText,
                page_count: 1,
            }),
            Err(reason) => Err(ExtractionError::Pdf(reason.clone())),
        }
    }
}
