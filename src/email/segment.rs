//! Splits extracted report text into its clinical interpretation section.
//!
//! Reports put the prose that matters after a "Clinical Interpretation"
//! heading; everything before it is letterhead, demographics and raw
//! values. When the heading is missing the whole text is used and the
//! caller is told via `marker_found` so it can warn.

use std::sync::LazyLock;

use regex::Regex;

static SECTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)clinical\s+interpretation[:\s]*").unwrap());

/// Output of [`segment`]. `test_summary` is a verbatim copy of the
/// interpretation, not a truncation; the merge layer concatenates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedText {
    pub clinical_interpretation: String,
    pub test_summary: String,
    pub full_text: String,
    pub marker_found: bool,
}

/// Segment raw extracted text. Empty input yields empty fields.
pub fn segment(raw_text: &str) -> SegmentedText {
    if raw_text.is_empty() {
        return SegmentedText {
            clinical_interpretation: String::new(),
            test_summary: String::new(),
            full_text: String::new(),
            marker_found: false,
        };
    }

    if let Some(m) = SECTION_MARKER.find(raw_text) {
        let interpretation = raw_text[m.end()..].trim().to_string();
        SegmentedText {
            clinical_interpretation: interpretation.clone(),
            test_summary: interpretation,
            full_text: raw_text.to_string(),
            marker_found: true,
        }
    } else {
        let trimmed = raw_text.trim().to_string();
        SegmentedText {
            clinical_interpretation: trimmed.clone(),
            test_summary: trimmed,
            full_text: raw_text.to_string(),
            marker_found: false,
        }
    }
}
