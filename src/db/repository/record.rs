use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{MedicalRecord, SubDocument};

const RECORD_COLUMNS: &str = "id, request_id, patient_name, test_type, clinical_text, \
     test_summary, needs_analysis, analysis_result, analysis_completed_at, created_at, last_updated";

pub fn insert_record(conn: &Connection, record: &MedicalRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records (id, request_id, patient_name, test_type, clinical_text,
         test_summary, needs_analysis, analysis_result, analysis_completed_at, created_at, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.id.to_string(),
            record.request_id,
            record.patient_name,
            record.test_type,
            record.clinical_text,
            record.test_summary,
            record.needs_analysis as i32,
            record.analysis_result,
            record.analysis_completed_at.map(format_dt),
            format_dt(record.created_at),
            format_dt(record.last_updated),
        ],
    )?;
    Ok(())
}

/// Exact-string lookup on the identity key. No normalization: "John Doe"
/// and "john doe" are distinct records.
pub fn get_record_by_key(
    conn: &Connection,
    request_id: &str,
    patient_name: &str,
) -> Result<Option<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM medical_records WHERE request_id = ?1 AND patient_name = ?2"
    ))?;

    let result = stmt.query_row(params![request_id, patient_name], record_row);
    match result {
        Ok(row) => Ok(Some(record_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_record(conn: &Connection, id: &Uuid) -> Result<Option<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM medical_records WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], record_row);
    match result {
        Ok(row) => Ok(Some(record_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Merge-side update: collated text, combined summary, latest test type,
/// and the needs_analysis flag in one statement.
pub fn apply_merge_update(
    conn: &Connection,
    record_id: &Uuid,
    clinical_text: &str,
    test_summary: &str,
    test_type: &str,
    last_updated: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE medical_records
         SET clinical_text = ?2, test_summary = ?3, test_type = ?4,
             needs_analysis = 1, last_updated = ?5
         WHERE id = ?1",
        params![
            record_id.to_string(),
            clinical_text,
            test_summary,
            test_type,
            format_dt(last_updated),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "MedicalRecord".into(),
            id: record_id.to_string(),
        });
    }
    Ok(())
}

/// All records flagged for analysis, oldest first so the sweep is fair.
pub fn get_records_needing_analysis(conn: &Connection) -> Result<Vec<MedicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM medical_records WHERE needs_analysis = 1 ORDER BY last_updated ASC"
    ))?;

    let rows = stmt.query_map([], record_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

/// Store the analysis text and clear the needs_analysis flag.
pub fn mark_analysis_complete(
    conn: &Connection,
    record_id: &Uuid,
    analysis_result: &str,
    completed_at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE medical_records
         SET needs_analysis = 0, analysis_result = ?2, analysis_completed_at = ?3
         WHERE id = ?1",
        params![record_id.to_string(), analysis_result, format_dt(completed_at)],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "MedicalRecord".into(),
            id: record_id.to_string(),
        });
    }
    Ok(())
}

pub fn insert_sub_document(conn: &Connection, doc: &SubDocument) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sub_documents (id, record_id, seq, source_file, original_filename,
         source_message_id, uploaded_at, test_summary, test_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            doc.id.to_string(),
            doc.record_id.to_string(),
            doc.seq,
            doc.source_file,
            doc.original_filename,
            doc.source_message_id,
            format_dt(doc.uploaded_at),
            doc.test_summary,
            doc.test_type,
        ],
    )?;
    Ok(())
}

/// Sub-documents in arrival order (seq ascending).
pub fn get_sub_documents(conn: &Connection, record_id: &Uuid) -> Result<Vec<SubDocument>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, record_id, seq, source_file, original_filename, source_message_id,
         uploaded_at, test_summary, test_type
         FROM sub_documents WHERE record_id = ?1 ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![record_id.to_string()], |row| {
        Ok(SubDocumentRow {
            id: row.get(0)?,
            record_id: row.get(1)?,
            seq: row.get(2)?,
            source_file: row.get(3)?,
            original_filename: row.get(4)?,
            source_message_id: row.get(5)?,
            uploaded_at: row.get(6)?,
            test_summary: row.get(7)?,
            test_type: row.get(8)?,
        })
    })?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(sub_document_from_row(row?)?);
    }
    Ok(docs)
}

/// The seq the next sub-document for this record should carry.
pub fn next_sub_document_seq(conn: &Connection, record_id: &Uuid) -> Result<i64, DatabaseError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(seq) FROM sub_documents WHERE record_id = ?1",
        params![record_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(max.map_or(0, |m| m + 1))
}

// Internal row types for mapping

struct RecordRow {
    id: String,
    request_id: String,
    patient_name: String,
    test_type: String,
    clinical_text: String,
    test_summary: String,
    needs_analysis: i32,
    analysis_result: Option<String>,
    analysis_completed_at: Option<String>,
    created_at: String,
    last_updated: String,
}

fn record_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        request_id: row.get(1)?,
        patient_name: row.get(2)?,
        test_type: row.get(3)?,
        clinical_text: row.get(4)?,
        test_summary: row.get(5)?,
        needs_analysis: row.get(6)?,
        analysis_result: row.get(7)?,
        analysis_completed_at: row.get(8)?,
        created_at: row.get(9)?,
        last_updated: row.get(10)?,
    })
}

struct SubDocumentRow {
    id: String,
    record_id: String,
    seq: i64,
    source_file: String,
    original_filename: String,
    source_message_id: String,
    uploaded_at: String,
    test_summary: String,
    test_type: String,
}

fn record_from_row(row: RecordRow) -> Result<MedicalRecord, DatabaseError> {
    Ok(MedicalRecord {
        id: parse_uuid(&row.id)?,
        request_id: row.request_id,
        patient_name: row.patient_name,
        test_type: row.test_type,
        clinical_text: row.clinical_text,
        test_summary: row.test_summary,
        needs_analysis: row.needs_analysis != 0,
        analysis_result: row.analysis_result,
        analysis_completed_at: row.analysis_completed_at.as_deref().map(parse_dt).transpose()?,
        created_at: parse_dt(&row.created_at)?,
        last_updated: parse_dt(&row.last_updated)?,
    })
}

fn sub_document_from_row(row: SubDocumentRow) -> Result<SubDocument, DatabaseError> {
    Ok(SubDocument {
        id: parse_uuid(&row.id)?,
        record_id: parse_uuid(&row.record_id)?,
        seq: row.seq,
        source_file: row.source_file,
        original_filename: row.original_filename,
        source_message_id: row.source_message_id,
        uploaded_at: parse_dt(&row.uploaded_at)?,
        test_summary: row.test_summary,
        test_type: row.test_type,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn format_dt(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn parse_dt(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
