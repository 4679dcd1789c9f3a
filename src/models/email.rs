use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ProcessingStatus;

/// One message yielded by a mail source.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub attachments: Vec<PdfAttachment>,
}

/// A PDF attachment's bytes plus its declared filename.
#[derive(Debug, Clone)]
pub struct PdfAttachment {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Identity triple parsed out of an email subject. Transient; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSubject {
    pub request_id: String,
    pub test_type: String,
    pub patient_name: String,
}

/// Row in the processed-email history. Written once per (message,
/// attachment) outcome; the unique message_id guards against reprocessing.
#[derive(Debug, Clone)]
pub struct EmailHistoryEntry {
    pub id: Uuid,
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub request_id: String,
    pub patient_name: String,
    pub test_type: String,
    pub has_pdf: bool,
    pub pdf_filename: Option<String>,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub processed_at: NaiveDateTime,
}
