//! Advisory check that extracted text actually looks like a medical
//! report. A negative result never blocks processing; the processor only
//! logs a warning.

use std::sync::LazyLock;

use regex::Regex;

const MEDICAL_KEYWORDS: &[&str] = &[
    "patient", "diagnosis", "test", "result", "medical", "doctor", "physician",
    "laboratory", "blood", "urine", "mri", "ct", "scan", "x-ray", "ultrasound",
    "biopsy", "pathology", "radiology", "clinical", "specimen", "sample",
    "normal", "abnormal", "negative", "positive", "mg/dl", "mmhg", "bpm",
];

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}").unwrap());

static REFERENCE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.?\d*\s*-\s*\d+\.?\d*").unwrap());

static MEDICAL_UNITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+\.?\d*\s*(mg|ml|dl|mm|cm|kg|lbs|bpm|mmhg)").unwrap());

#[derive(Debug, Clone)]
pub struct ContentCheck {
    pub keyword_count: usize,
    pub has_medical_patterns: bool,
    pub is_likely_medical: bool,
}

pub fn check_medical_content(text: &str) -> ContentCheck {
    let lower = text.to_lowercase();
    let keyword_count = MEDICAL_KEYWORDS.iter().filter(|k| lower.contains(**k)).count();

    let has_medical_patterns = DATE_PATTERN.is_match(text)
        || REFERENCE_RANGE.is_match(text)
        || MEDICAL_UNITS.is_match(text);

    ContentCheck {
        keyword_count,
        has_medical_patterns,
        is_likely_medical: keyword_count >= 2 || has_medical_patterns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_text_is_likely_medical() {
        let check = check_medical_content("Patient blood test: hemoglobin 9.1 mg/dl, abnormal");
        assert!(check.is_likely_medical);
        assert!(check.keyword_count >= 2);
    }

    #[test]
    fn units_alone_count_as_pattern() {
        let check = check_medical_content("value 120 mmHg recorded");
        assert!(check.has_medical_patterns);
        assert!(check.is_likely_medical);
    }

    #[test]
    fn prose_is_not_medical() {
        let check = check_medical_content("See you at the meeting tomorrow");
        assert!(!check.is_likely_medical);
        assert_eq!(check.keyword_count, 0);
    }
}
