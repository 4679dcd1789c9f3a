use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::EmailHistoryEntry;

use super::record::format_dt;

/// Record that a message (or one of its attachments) has been handled.
/// The same message_id may legitimately produce several rows when an email
/// carries multiple PDFs; `INSERT OR IGNORE` keeps the first and the
/// processed check only cares that at least one exists.
pub fn add_processed_email(conn: &Connection, entry: &EmailHistoryEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO email_history
         (id, message_id, subject, sender, request_id, patient_name, test_type,
          has_pdf, pdf_filename, status, error_message, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            entry.id.to_string(),
            entry.message_id,
            entry.subject,
            entry.sender,
            entry.request_id,
            entry.patient_name,
            entry.test_type,
            entry.has_pdf as i32,
            entry.pdf_filename,
            entry.status.as_str(),
            entry.error_message,
            format_dt(entry.processed_at),
        ],
    )?;
    Ok(())
}

/// Has this message_id been seen before? Once recorded, a message is never
/// reprocessed regardless of its stored status.
pub fn is_email_processed(conn: &Connection, message_id: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM email_history WHERE message_id = ?1",
        params![message_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
