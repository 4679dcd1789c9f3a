//! Create-or-merge of medical records keyed by (request_id, patient_name).
//!
//! The whole lookup-then-write runs inside one IMMEDIATE transaction, so
//! two submissions for the same key serialize instead of both observing
//! "not found". The unique index on the key is the backstop: if a racing
//! create still slips through from another connection, the constraint
//! violation surfaces as `MergeConflict` and the caller retries.

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use tracing;
use uuid::Uuid;

use crate::db::repository::record as records;
use crate::db::DatabaseError;
use crate::models::{MedicalRecord, MergeAction, SubDocument};

use super::ProcessError;

/// Literal separator placed between collated document texts.
pub const DOCUMENT_SEPARATOR: &str = "\n\n--- NEW DOCUMENT ---\n\n";

/// Literal separator between accumulated per-document summaries.
pub const SUMMARY_SEPARATOR: &str = " | ";

/// Everything the merge engine needs about one incoming document.
#[derive(Debug, Clone)]
pub struct MergeInput {
    pub request_id: String,
    pub patient_name: String,
    pub test_type: String,
    /// Clinical interpretation text of this document.
    pub document_text: String,
    pub test_summary: String,
    /// Opaque handle to the stored binary.
    pub source_file: String,
    pub original_filename: String,
    pub source_message_id: String,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub record_id: Uuid,
    pub action: MergeAction,
    pub is_duplicate: bool,
    /// Full collated clinical text after this merge.
    pub collated_text: String,
}

/// Create the record for this key, or merge the document into the existing
/// one. Atomic per key: either the full append plus field update lands, or
/// nothing does.
pub fn create_or_merge(conn: &mut Connection, input: MergeInput) -> Result<MergeOutcome, ProcessError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DatabaseError::from)?;

    let existing = records::get_record_by_key(&tx, &input.request_id, &input.patient_name)?;
    let now = Utc::now().naive_utc();

    let outcome = match existing {
        Some(record) => {
            let collated_text = if record.clinical_text.is_empty() {
                input.document_text.clone()
            } else {
                format!("{}{}{}", record.clinical_text, DOCUMENT_SEPARATOR, input.document_text)
            };
            let combined_summary = combine_summaries(&record.test_summary, &input.test_summary);

            records::apply_merge_update(
                &tx,
                &record.id,
                &collated_text,
                &combined_summary,
                &input.test_type,
                now,
            )?;

            let seq = records::next_sub_document_seq(&tx, &record.id)?;
            records::insert_sub_document(&tx, &sub_document(&record.id, seq, &input, now))?;

            tracing::info!(
                request_id = %input.request_id,
                patient_name = %input.patient_name,
                seq,
                "Merged document into existing record"
            );

            MergeOutcome {
                record_id: record.id,
                action: MergeAction::Updated,
                is_duplicate: true,
                collated_text,
            }
        }
        None => {
            let record = MedicalRecord {
                id: Uuid::new_v4(),
                request_id: input.request_id.clone(),
                patient_name: input.patient_name.clone(),
                test_type: input.test_type.clone(),
                clinical_text: input.document_text.clone(),
                test_summary: input.test_summary.clone(),
                needs_analysis: false,
                analysis_result: None,
                analysis_completed_at: None,
                created_at: now,
                last_updated: now,
            };

            records::insert_record(&tx, &record).map_err(map_create_conflict(&input))?;
            records::insert_sub_document(&tx, &sub_document(&record.id, 0, &input, now))?;

            tracing::info!(
                request_id = %input.request_id,
                patient_name = %input.patient_name,
                "Created new medical record"
            );

            MergeOutcome {
                record_id: record.id,
                action: MergeAction::Created,
                is_duplicate: false,
                collated_text: input.document_text,
            }
        }
    };

    tx.commit().map_err(DatabaseError::from)?;
    Ok(outcome)
}

/// Old " | " new when both sides are non-empty; otherwise whichever side
/// has content (the old one when the new summary is empty).
fn combine_summaries(existing: &str, incoming: &str) -> String {
    if incoming.is_empty() {
        existing.to_string()
    } else if existing.is_empty() {
        incoming.to_string()
    } else {
        format!("{existing}{SUMMARY_SEPARATOR}{incoming}")
    }
}

fn sub_document(record_id: &Uuid, seq: i64, input: &MergeInput, now: chrono::NaiveDateTime) -> SubDocument {
    SubDocument {
        id: Uuid::new_v4(),
        record_id: *record_id,
        seq,
        source_file: input.source_file.clone(),
        original_filename: input.original_filename.clone(),
        source_message_id: input.source_message_id.clone(),
        uploaded_at: now,
        test_summary: input.test_summary.clone(),
        test_type: input.test_type.clone(),
    }
}

/// A unique-constraint failure on the identity key during create means a
/// concurrent writer won the race; everything else passes through.
fn map_create_conflict(input: &MergeInput) -> impl Fn(DatabaseError) -> ProcessError + '_ {
    move |err| match &err {
        DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            ProcessError::MergeConflict {
                request_id: input.request_id.clone(),
                patient_name: input.patient_name.clone(),
            }
        }
        _ => ProcessError::Database(err),
    }
}
