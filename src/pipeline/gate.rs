//! Two-of-two completeness gate.
//!
//! A merged record is ready for analysis once it holds at least one Blood
//! Work and one CT Scan sub-document. The gate is a pure predicate over
//! the sub-document list; whether a ready record actually gets analyzed
//! again is decided by the orchestrator via the needs_analysis flag.

use crate::models::{SubDocument, TestCategory};

use super::classify;

/// Gate verdict with the representative summary of each required type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionStatus {
    pub ready: bool,
    pub blood_summary: Option<String>,
    pub ct_summary: Option<String>,
}

/// Classify every sub-document and check for the Blood Work + CT Scan
/// pair. Representatives are the earliest-inserted entry of each type;
/// later duplicates of a type are ignored, not merged.
pub fn evaluate(sub_documents: &[SubDocument]) -> CompletionStatus {
    let mut blood_summary = None;
    let mut ct_summary = None;

    for doc in sub_documents {
        match classify::classify(&doc.original_filename, &doc.test_type) {
            TestCategory::BloodWork => {
                if blood_summary.is_none() {
                    blood_summary = Some(doc.test_summary.clone());
                }
            }
            TestCategory::CtScan => {
                if ct_summary.is_none() {
                    ct_summary = Some(doc.test_summary.clone());
                }
            }
            TestCategory::Unknown => {}
        }
    }

    CompletionStatus {
        ready: blood_summary.is_some() && ct_summary.is_some(),
        blood_summary,
        ct_summary,
    }
}
