//! Ingestion pipeline: classification, merge engine, completion gate, and
//! the batch orchestrator that drives them.

pub mod classify;
pub mod gate;
pub mod merge;
pub mod processor;

use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::db::DatabaseError;
use crate::extraction::ExtractionError;
use crate::mail::MailError;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Concurrent create for request {request_id} patient {patient_name}")]
    MergeConflict { request_id: String, patient_name: String },
}
