//! Subject-line parsing for inbound report emails.
//!
//! Senders are not consistent, so parsing is an ordered cascade of
//! patterns; the first one that matches wins and partial matches are never
//! combined across patterns. Known shapes:
//!
//! - `Request ID: REQ123 | Test: Blood Work | Patient: John Doe`
//! - `REQ456 - MRI Scan - Jane Smith`
//! - `Request REQ789 Blood Test for Patient Mary Johnson`
//!
//! plus a heuristic fallback that keys off any `REQ...` token. A subject
//! none of them match is not a medical email.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ParsedSubject;

static LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Request\s+ID:\s*([A-Z0-9]+).*?Test:\s*([^|]+).*?Patient:\s*([^|]+)").unwrap()
});

static DASHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(REQ[A-Z0-9]+)\s*-\s*([^-]+)\s*-\s*(.+)").unwrap());

static PREPOSITIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Request\s+(REQ[A-Z0-9]+)\s+(.+?)\s+for\s+Patient\s+(.+)").unwrap()
});

static REQUEST_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)REQ[A-Z0-9]+").unwrap());

static PATIENT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Patient[:\s]+([A-Za-z\s]+)").unwrap());

/// Parse a free-text subject into the identity triple, or `None` when the
/// subject carries no recognizable medical request.
pub fn parse(subject: &str) -> Option<ParsedSubject> {
    for pattern in [&*LABELED, &*DASHED, &*PREPOSITIONAL] {
        if let Some(caps) = pattern.captures(subject) {
            return Some(ParsedSubject {
                request_id: trim_value(&caps[1]),
                test_type: trim_value(&caps[2]),
                patient_name: trim_value(&caps[3]),
            });
        }
    }

    parse_heuristic(subject)
}

/// Last-resort parse: any `REQ<alnum>` token is the request id, the patient
/// name comes from a `Patient:` label or the trailing two words, and the
/// test type is whatever sits between the two. An empty test type rejects
/// the candidate.
fn parse_heuristic(subject: &str) -> Option<ParsedSubject> {
    let req = REQUEST_TOKEN.find(subject)?;
    let request_id = req.as_str().to_string();

    let patient_match = PATIENT_LABEL.captures(subject);
    let words: Vec<&str> = subject.split_whitespace().collect();

    let patient_name = match &patient_match {
        Some(caps) => trim_value(&caps[1]),
        None if words.len() >= 3 => words[words.len() - 2..].join(" "),
        None => "Unknown Patient".to_string(),
    };

    let test_type = match &patient_match {
        Some(caps) => {
            let label_start = caps.get(0).map(|m| m.start()).unwrap_or(subject.len());
            let between = subject.get(req.end()..label_start).unwrap_or("");
            trim_value(between)
        }
        None => {
            let req_index = words
                .iter()
                .position(|w| w.to_uppercase().contains("REQ"))
                .unwrap_or(0);
            if words.len() > req_index + 1 {
                if words.len() >= req_index + 3 {
                    words[req_index + 1..words.len() - 2].join(" ")
                } else {
                    String::new()
                }
            } else {
                "Unknown Test".to_string()
            }
        }
    };

    if test_type.is_empty() {
        return None;
    }

    Some(ParsedSubject {
        request_id,
        test_type,
        patient_name,
    })
}

/// Captured values keep their original casing but lose surrounding
/// whitespace and the separator characters subjects use between fields.
fn trim_value(s: &str) -> String {
    s.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '|')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_form() {
        let parsed = parse("Request ID: REQ123 | Test: Blood Work | Patient: John Doe").unwrap();
        assert_eq!(parsed.request_id, "REQ123");
        assert_eq!(parsed.test_type, "Blood Work");
        assert_eq!(parsed.patient_name, "John Doe");
    }

    #[test]
    fn labeled_form_case_insensitive_labels() {
        let parsed = parse("request id: REQ77 | test: CT Scan | patient: Ana Lima").unwrap();
        assert_eq!(parsed.request_id, "REQ77");
        assert_eq!(parsed.test_type, "CT Scan");
        assert_eq!(parsed.patient_name, "Ana Lima");
    }

    #[test]
    fn dashed_form() {
        let parsed = parse("REQ456 - MRI Scan - Jane Smith").unwrap();
        assert_eq!(parsed.request_id, "REQ456");
        assert_eq!(parsed.test_type, "MRI Scan");
        assert_eq!(parsed.patient_name, "Jane Smith");
    }

    #[test]
    fn prepositional_form() {
        let parsed = parse("Request REQ789 Blood Test for Patient Mary Johnson").unwrap();
        assert_eq!(parsed.request_id, "REQ789");
        assert_eq!(parsed.test_type, "Blood Test");
        assert_eq!(parsed.patient_name, "Mary Johnson");
    }

    #[test]
    fn captured_values_keep_original_casing() {
        let parsed = parse("req456 - mri scan - jane smith").unwrap();
        assert_eq!(parsed.request_id, "req456");
        assert_eq!(parsed.test_type, "mri scan");
        assert_eq!(parsed.patient_name, "jane smith");
    }

    #[test]
    fn heuristic_with_patient_label() {
        let parsed = parse("Results REQ22 Chest CT Patient: Sam Reed").unwrap();
        assert_eq!(parsed.request_id, "REQ22");
        assert_eq!(parsed.test_type, "Chest CT");
        assert_eq!(parsed.patient_name, "Sam Reed");
    }

    #[test]
    fn heuristic_takes_trailing_words_as_name() {
        let parsed = parse("REQ300 Ultrasound Abdomen Kim Park").unwrap();
        assert_eq!(parsed.request_id, "REQ300");
        assert_eq!(parsed.test_type, "Ultrasound Abdomen");
        assert_eq!(parsed.patient_name, "Kim Park");
    }

    #[test]
    fn heuristic_rejects_when_no_test_type_remains() {
        // Only the request token and two name words: nothing left between.
        assert!(parse("REQ55 Kim Park").is_none());
    }

    #[test]
    fn no_markers_yields_none() {
        assert!(parse("Hello world no markers").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn first_pattern_wins() {
        // Contains both labeled fields and dashes; labeled form applies.
        let parsed = parse("Request ID: REQ9 | Test: X-Ray | Patient: Lee Chan - urgent").unwrap();
        assert_eq!(parsed.request_id, "REQ9");
        assert_eq!(parsed.test_type, "X-Ray");
        assert_eq!(parsed.patient_name, "Lee Chan - urgent");
    }
}
