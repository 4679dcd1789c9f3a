//! Canonical test-type classification.
//!
//! Attachment filenames come straight from the lab systems and are far
//! more reliable than the free-text test type parsed out of a subject, so
//! the filename is checked first and the declared type is only a fallback.

use crate::models::TestCategory;

const BLOOD_FILENAME_HINTS: &[&str] = &["blood", "lab", "hematology"];
const CT_FILENAME_HINTS: &[&str] = &["ct", "scan", "radiology"];

/// Map a filename and a declared test type to the small canonical
/// vocabulary. `Unknown` is a valid terminal answer, not a failure.
pub fn classify(filename: &str, raw_test_type: &str) -> TestCategory {
    let filename = filename.to_lowercase();
    if BLOOD_FILENAME_HINTS.iter().any(|hint| filename.contains(hint)) {
        return TestCategory::BloodWork;
    }
    if CT_FILENAME_HINTS.iter().any(|hint| filename.contains(hint)) {
        return TestCategory::CtScan;
    }

    let raw = raw_test_type.to_lowercase();
    if raw.contains("blood") {
        TestCategory::BloodWork
    } else if raw.contains("ct") {
        TestCategory::CtScan
    } else {
        TestCategory::Unknown
    }
}
