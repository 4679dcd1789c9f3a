use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate root for one clinical request. Identified by the exact-string
/// pair (request_id, patient_name); created on the first document for the
/// key and mutated in place on every later one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub request_id: String,
    pub patient_name: String,
    /// Most recently supplied test type label. Overwritten on merge.
    pub test_type: String,
    /// Clinical interpretation text accumulated across sub-documents.
    pub clinical_text: String,
    /// Per-document summaries joined with " | ".
    pub test_summary: String,
    pub needs_analysis: bool,
    pub analysis_result: Option<String>,
    pub analysis_completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub last_updated: NaiveDateTime,
}

/// One stored document within a record. Owned by its record; `seq` is the
/// arrival order and is never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubDocument {
    pub id: Uuid,
    pub record_id: Uuid,
    pub seq: i64,
    pub source_file: String,
    pub original_filename: String,
    pub source_message_id: String,
    pub uploaded_at: NaiveDateTime,
    pub test_summary: String,
    pub test_type: String,
}
