//! Batch orchestrator.
//!
//! Drives one pass over a mail source: dedup against history, subject
//! parse, PDF extraction, segmentation, create-or-merge, and the
//! completion gate that hands ready records to the analysis chain. One
//! failing email never aborts the batch; it is recorded in history and
//! counted, and the next message is processed.

use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisRequest, ProviderChain};
use crate::db::repository::{email_history, record as records};
use crate::email::{self, segment};
use crate::extraction::{check_medical_content, PdfTextExtractor};
use crate::mail::MailSource;
use crate::models::{
    EmailHistoryEntry, InboundMessage, MedicalRecord, MergeAction, ParsedSubject, ProcessingStatus,
};

use super::merge::{self, MergeInput};
use super::{gate, ProcessError};

/// Counters for one batch pass, logged at the end of the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub emails_checked: usize,
    pub medical_emails_found: usize,
    pub records_created: usize,
    pub records_updated: usize,
    pub pdfs_processed: usize,
    pub errors: usize,
}

pub struct EmailProcessor {
    conn: Connection,
    extractor: Box<dyn PdfTextExtractor>,
    analyzers: ProviderChain,
}

impl EmailProcessor {
    pub fn new(conn: Connection, extractor: Box<dyn PdfTextExtractor>, analyzers: ProviderChain) -> Self {
        Self { conn, extractor, analyzers }
    }

    /// Pull up to `max_emails` messages and process each one. Per-message
    /// failures are recorded and counted; only source and history-write
    /// failures abort the batch.
    pub fn process_batch(
        &mut self,
        source: &mut dyn MailSource,
        max_emails: usize,
    ) -> Result<BatchStats, ProcessError> {
        let messages = source.fetch_recent(max_emails)?;
        let mut stats = BatchStats::default();

        for message in &messages {
            stats.emails_checked += 1;

            if email_history::is_email_processed(&self.conn, &message.message_id)? {
                debug!(message_id = %message.message_id, "Already processed, skipping");
                source.complete(&message.message_id)?;
                continue;
            }

            self.process_message(message, &mut stats)?;
            source.complete(&message.message_id)?;
        }

        info!(
            emails_checked = stats.emails_checked,
            medical_emails_found = stats.medical_emails_found,
            records_created = stats.records_created,
            records_updated = stats.records_updated,
            pdfs_processed = stats.pdfs_processed,
            errors = stats.errors,
            "Batch complete"
        );
        Ok(stats)
    }

    fn process_message(
        &mut self,
        message: &InboundMessage,
        stats: &mut BatchStats,
    ) -> Result<(), ProcessError> {
        let Some(parsed) = email::parse(&message.subject) else {
            debug!(subject = %message.subject, "Subject is not a medical report");
            self.record_history(message, None, ProcessingStatus::NonMedical, None, None)?;
            return Ok(());
        };

        stats.medical_emails_found += 1;
        info!(
            request_id = %parsed.request_id,
            patient_name = %parsed.patient_name,
            test_type = %parsed.test_type,
            "Processing medical report email"
        );

        if message.attachments.is_empty() {
            warn!(message_id = %message.message_id, "Medical email carries no PDF attachment");
            self.record_history(message, Some(&parsed), ProcessingStatus::Success, None, None)?;
            return Ok(());
        }

        let mut last_error: Option<String> = None;
        let mut any_succeeded = false;
        let mut first_filename: Option<String> = None;

        for attachment in &message.attachments {
            first_filename.get_or_insert_with(|| attachment.filename.clone());

            match self.process_attachment(message, &parsed, &attachment.filename, &attachment.data, stats) {
                Ok(()) => any_succeeded = true,
                Err(e) => {
                    warn!(
                        filename = %attachment.filename,
                        error = %e,
                        "Failed to process attachment"
                    );
                    stats.errors += 1;
                    last_error = Some(e.to_string());
                }
            }
        }

        let status = if any_succeeded { ProcessingStatus::Success } else { ProcessingStatus::Failed };
        self.record_history(message, Some(&parsed), status, first_filename, last_error)?;
        Ok(())
    }

    fn process_attachment(
        &mut self,
        message: &InboundMessage,
        parsed: &ParsedSubject,
        filename: &str,
        pdf_bytes: &[u8],
        stats: &mut BatchStats,
    ) -> Result<(), ProcessError> {
        let extracted = self.extractor.extract(pdf_bytes, filename)?;

        let check = check_medical_content(&extracted.text);
        if !check.is_likely_medical {
            warn!(
                filename,
                keyword_count = check.keyword_count,
                "Extracted text does not look like a medical report"
            );
        }

        let segmented = segment(&extracted.text);
        if !segmented.marker_found {
            warn!(filename, "No clinical interpretation heading, using full text");
        }

        let now = Utc::now().naive_utc();
        let input = MergeInput {
            request_id: parsed.request_id.clone(),
            patient_name: parsed.patient_name.clone(),
            test_type: parsed.test_type.clone(),
            document_text: segmented.clinical_interpretation,
            test_summary: segmented.test_summary,
            source_file: format!(
                "{}_{}_{}_{filename}",
                parsed.request_id,
                parsed.patient_name,
                now.format("%Y%m%d_%H%M%S")
            ),
            original_filename: filename.to_string(),
            source_message_id: message.message_id.clone(),
        };

        let outcome = match merge::create_or_merge(&mut self.conn, input.clone()) {
            // A racing create for the same key landed first; retrying
            // takes the merge path.
            Err(ProcessError::MergeConflict { ref request_id, ref patient_name }) => {
                warn!(%request_id, %patient_name, "Create raced, retrying as merge");
                merge::create_or_merge(&mut self.conn, input)?
            }
            other => other?,
        };

        stats.pdfs_processed += 1;
        match outcome.action {
            MergeAction::Created => stats.records_created += 1,
            MergeAction::Updated => stats.records_updated += 1,
        }

        if outcome.is_duplicate {
            self.run_completion_gate(&outcome.record_id)?;
        }
        Ok(())
    }

    /// Check a merged record against the Blood Work + CT Scan gate and
    /// dispatch analysis when it is ready and still flagged. A failed
    /// analysis leaves the flag set so the pending sweep retries it.
    fn run_completion_gate(&mut self, record_id: &Uuid) -> Result<(), ProcessError> {
        let sub_documents = records::get_sub_documents(&self.conn, record_id)?;
        let status = gate::evaluate(&sub_documents);
        if !status.ready {
            debug!(
                %record_id,
                has_blood = status.blood_summary.is_some(),
                has_ct = status.ct_summary.is_some(),
                "Record not yet complete"
            );
            return Ok(());
        }

        let Some(record) = records::get_record(&self.conn, record_id)? else {
            return Ok(());
        };
        if !record.needs_analysis {
            return Ok(());
        }

        self.analyze_record(&record, status.blood_summary.as_deref(), status.ct_summary.as_deref())?;
        Ok(())
    }

    /// Returns whether an analysis result was stored.
    fn analyze_record(
        &mut self,
        record: &MedicalRecord,
        blood_summary: Option<&str>,
        ct_summary: Option<&str>,
    ) -> Result<bool, ProcessError> {
        let combined_text = match (blood_summary, ct_summary) {
            (Some(blood), Some(ct)) => crate::analysis::prompt::pair_content(blood, ct),
            _ => record.clinical_text.clone(),
        };

        let request = AnalysisRequest {
            combined_text,
            patient_name: record.patient_name.clone(),
            request_id: record.request_id.clone(),
            test_type: record.test_type.clone(),
        };

        match self.analyzers.analyze(&request) {
            Ok(outcome) => {
                records::mark_analysis_complete(
                    &self.conn,
                    &record.id,
                    &outcome.analysis,
                    Utc::now().naive_utc(),
                )?;
                info!(
                    record_id = %record.id,
                    provider = outcome.provider,
                    model = %outcome.model,
                    "Stored analysis for complete record"
                );
                Ok(true)
            }
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Analysis failed, will retry on next sweep");
                Ok(false)
            }
        }
    }

    /// Retry analysis for every record still flagged, oldest first. Used
    /// at the end of a run and by the standalone sweep command. Records
    /// whose gate is not complete are still analyzed, over their full
    /// collated text instead of the two-summary pairing.
    pub fn process_pending_analyses(&mut self) -> Result<usize, ProcessError> {
        let pending = records::get_records_needing_analysis(&self.conn)?;
        if pending.is_empty() {
            return Ok(0);
        }
        info!(count = pending.len(), "Sweeping records pending analysis");

        let mut completed = 0;
        for record in pending {
            let sub_documents = records::get_sub_documents(&self.conn, &record.id)?;
            let status = gate::evaluate(&sub_documents);
            let (blood, ct) = if status.ready {
                (status.blood_summary, status.ct_summary)
            } else {
                (None, None)
            };
            if self.analyze_record(&record, blood.as_deref(), ct.as_deref())? {
                completed += 1;
            }
        }
        Ok(completed)
    }

    fn record_history(
        &self,
        message: &InboundMessage,
        parsed: Option<&ParsedSubject>,
        status: ProcessingStatus,
        pdf_filename: Option<String>,
        error_message: Option<String>,
    ) -> Result<(), ProcessError> {
        let entry = EmailHistoryEntry {
            id: Uuid::new_v4(),
            message_id: message.message_id.clone(),
            subject: message.subject.clone(),
            sender: message.sender.clone(),
            request_id: parsed.map(|p| p.request_id.clone()).unwrap_or_default(),
            patient_name: parsed.map(|p| p.patient_name.clone()).unwrap_or_default(),
            test_type: parsed.map(|p| p.test_type.clone()).unwrap_or_default(),
            has_pdf: !message.attachments.is_empty(),
            pdf_filename,
            status,
            error_message,
            processed_at: Utc::now().naive_utc(),
        };
        email_history::add_processed_email(&self.conn, &entry)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MockProvider;
    use crate::db::sqlite::open_memory_database;
    use crate::extraction::MockExtractor;
    use crate::mail::InMemoryMailSource;
    use crate::models::PdfAttachment;

    fn message(message_id: &str, subject: &str, attachments: Vec<(&str, &str)>) -> InboundMessage {
        InboundMessage {
            message_id: message_id.into(),
            subject: subject.into(),
            sender: "lab@example.com".into(),
            attachments: attachments
                .into_iter()
                .map(|(name, _)| PdfAttachment { filename: name.into(), data: b"%PDF".to_vec() })
                .collect(),
        }
    }

    fn processor(extractor: MockExtractor, providers: Vec<Box<dyn crate::analysis::AnalysisProvider>>) -> EmailProcessor {
        EmailProcessor::new(
            open_memory_database().unwrap(),
            Box::new(extractor),
            ProviderChain::new(providers),
        )
    }

    #[test]
    fn non_medical_email_is_recorded_and_skipped() {
        let mut p = processor(MockExtractor::returning("x"), vec![]);
        let mut source = InMemoryMailSource::new(vec![message("<m1>", "Lunch on Friday?", vec![])]);

        let stats = p.process_batch(&mut source, 10).unwrap();
        assert_eq!(stats.emails_checked, 1);
        assert_eq!(stats.medical_emails_found, 0);
        assert!(email_history::is_email_processed(&p.conn, "<m1>").unwrap());
    }

    #[test]
    fn first_report_creates_record_without_analysis() {
        let mut p = processor(
            MockExtractor::returning("Clinical Interpretation: Hemoglobin low."),
            vec![Box::new(MockProvider::succeeding("mock", "diagnosis"))],
        );
        let mut source = InMemoryMailSource::new(vec![message(
            "<m1>",
            "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
            vec![("blood_panel.pdf", "")],
        )]);

        let stats = p.process_batch(&mut source, 10).unwrap();
        assert_eq!(stats.records_created, 1);
        assert_eq!(stats.records_updated, 0);

        let record = records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().unwrap();
        assert!(!record.needs_analysis);
        assert!(record.analysis_result.is_none());
    }

    #[test]
    fn second_report_completes_gate_and_analyzes() {
        let mut p = processor(
            MockExtractor::returning("Clinical Interpretation: Findings here."),
            vec![Box::new(MockProvider::succeeding("mock", "combined diagnosis"))],
        );
        let mut source = InMemoryMailSource::new(vec![
            message(
                "<m1>",
                "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
                vec![("blood_panel.pdf", "")],
            ),
            message(
                "<m2>",
                "Request ID: REQ1 | Test: CT Scan | Patient: John Doe",
                vec![("ct_chest.pdf", "")],
            ),
        ]);

        let stats = p.process_batch(&mut source, 10).unwrap();
        assert_eq!(stats.records_created, 1);
        assert_eq!(stats.records_updated, 1);

        let record = records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().unwrap();
        assert!(!record.needs_analysis);
        assert_eq!(record.analysis_result.as_deref(), Some("combined diagnosis"));
        assert!(record.analysis_completed_at.is_some());
    }

    #[test]
    fn two_blood_reports_do_not_fire_the_gate() {
        let mut p = processor(
            MockExtractor::returning("Clinical Interpretation: Findings."),
            vec![Box::new(MockProvider::succeeding("mock", "should not run"))],
        );
        let mut source = InMemoryMailSource::new(vec![
            message(
                "<m1>",
                "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
                vec![("blood_1.pdf", "")],
            ),
            message(
                "<m2>",
                "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
                vec![("blood_2.pdf", "")],
            ),
        ]);

        p.process_batch(&mut source, 10).unwrap();

        let record = records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().unwrap();
        assert!(record.needs_analysis);
        assert!(record.analysis_result.is_none());
    }

    #[test]
    fn failed_analysis_leaves_flag_for_sweep() {
        let mut p = processor(
            MockExtractor::returning("Clinical Interpretation: Findings."),
            vec![Box::new(MockProvider::failing("mock", "backend down"))],
        );
        let mut source = InMemoryMailSource::new(vec![
            message(
                "<m1>",
                "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
                vec![("blood_panel.pdf", "")],
            ),
            message(
                "<m2>",
                "Request ID: REQ1 | Test: CT Scan | Patient: John Doe",
                vec![("ct_chest.pdf", "")],
            ),
        ]);

        p.process_batch(&mut source, 10).unwrap();
        let record = records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().unwrap();
        assert!(record.needs_analysis);

        // The sweep with a working provider finishes the job.
        p.analyzers = ProviderChain::new(vec![Box::new(MockProvider::succeeding("mock", "late diagnosis"))]);
        let completed = p.process_pending_analyses().unwrap();
        assert_eq!(completed, 1);

        let record = records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().unwrap();
        assert!(!record.needs_analysis);
        assert_eq!(record.analysis_result.as_deref(), Some("late diagnosis"));
    }

    #[test]
    fn record_created_by_another_writer_is_merged_not_conflicted() {
        let mut p = processor(
            MockExtractor::returning("Clinical Interpretation: Second opinion."),
            vec![],
        );
        let winner = MedicalRecord {
            id: uuid::Uuid::new_v4(),
            request_id: "REQ1".into(),
            patient_name: "John Doe".into(),
            test_type: "Blood Work".into(),
            clinical_text: "First report.".into(),
            test_summary: "first".into(),
            needs_analysis: false,
            analysis_result: None,
            analysis_completed_at: None,
            created_at: Utc::now().naive_utc(),
            last_updated: Utc::now().naive_utc(),
        };
        records::insert_record(&p.conn, &winner).unwrap();

        let mut source = InMemoryMailSource::new(vec![message(
            "<m2>",
            "Request ID: REQ1 | Test: CT Scan | Patient: John Doe",
            vec![("ct_chest.pdf", "")],
        )]);
        let stats = p.process_batch(&mut source, 10).unwrap();

        assert_eq!(stats.records_created, 0);
        assert_eq!(stats.records_updated, 1);
        let record = records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().unwrap();
        assert_eq!(record.id, winner.id);
        assert!(record.clinical_text.contains("--- NEW DOCUMENT ---"));
    }

    #[test]
    fn seen_message_id_is_skipped_entirely() {
        let mut p = processor(
            MockExtractor::returning("Clinical Interpretation: Findings."),
            vec![],
        );
        let msg = message(
            "<m1>",
            "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
            vec![("blood_panel.pdf", "")],
        );
        let mut first = InMemoryMailSource::new(vec![msg.clone()]);
        p.process_batch(&mut first, 10).unwrap();

        let mut replay = InMemoryMailSource::new(vec![msg]);
        let stats = p.process_batch(&mut replay, 10).unwrap();
        assert_eq!(stats.medical_emails_found, 0);
        assert_eq!(stats.pdfs_processed, 0);

        let docs_count: i64 = p
            .conn
            .query_row("SELECT COUNT(*) FROM sub_documents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(docs_count, 1);
    }

    #[test]
    fn directory_manifests_are_completed_after_history_write() {
        use crate::mail::DirectoryMailSource;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blood.pdf"), b"%PDF").unwrap();
        std::fs::write(
            dir.path().join("msg1.json"),
            r#"{"message_id":"<m1@lab>","subject":"Request ID: REQ1 | Test: Blood Work | Patient: John Doe","sender":"lab@example.com","attachments":["blood.pdf"]}"#,
        )
        .unwrap();

        let mut p = processor(
            MockExtractor::returning("Clinical Interpretation: Findings."),
            vec![],
        );
        let mut source = DirectoryMailSource::new(dir.path());
        let stats = p.process_batch(&mut source, 10).unwrap();

        assert_eq!(stats.records_created, 1);
        assert!(email_history::is_email_processed(&p.conn, "<m1@lab>").unwrap());
        assert!(dir.path().join("msg1.json.done").exists());
        assert!(!dir.path().join("msg1.json").exists());
    }

    #[test]
    fn extraction_failure_is_counted_and_recorded() {
        let mut p = processor(MockExtractor::failing("corrupt xref"), vec![]);
        let mut source = InMemoryMailSource::new(vec![message(
            "<m1>",
            "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
            vec![("blood_panel.pdf", "")],
        )]);

        let stats = p.process_batch(&mut source, 10).unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.pdfs_processed, 0);
        assert!(records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().is_none());

        let status: String = p
            .conn
            .query_row(
                "SELECT status FROM email_history WHERE message_id = '<m1>'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(status, "failed");
    }

    #[test]
    fn failing_email_does_not_abort_the_batch() {
        let mut p = processor(MockExtractor::failing("corrupt xref"), vec![]);
        let mut source = InMemoryMailSource::new(vec![
            message(
                "<m1>",
                "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
                vec![("blood_panel.pdf", "")],
            ),
            message("<m2>", "Weekly newsletter", vec![]),
        ]);

        let stats = p.process_batch(&mut source, 10).unwrap();
        assert_eq!(stats.emails_checked, 2);
        assert_eq!(stats.errors, 1);
        assert!(email_history::is_email_processed(&p.conn, "<m2>").unwrap());
    }

    #[test]
    fn sweep_analyzes_incomplete_record_over_collated_text() {
        // Two Blood Work reports never satisfy the gate, but the record
        // must not stay pending forever once a provider is available.
        let mut p = processor(
            MockExtractor::returning("Clinical Interpretation: Findings."),
            vec![Box::new(MockProvider::succeeding("mock", "blood-only analysis"))],
        );
        let mut source = InMemoryMailSource::new(vec![
            message(
                "<m1>",
                "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
                vec![("blood_1.pdf", "")],
            ),
            message(
                "<m2>",
                "Request ID: REQ1 | Test: Blood Work | Patient: John Doe",
                vec![("blood_2.pdf", "")],
            ),
        ]);
        p.process_batch(&mut source, 10).unwrap();

        let record = records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().unwrap();
        assert!(record.needs_analysis);

        assert_eq!(p.process_pending_analyses().unwrap(), 1);
        let record = records::get_record_by_key(&p.conn, "REQ1", "John Doe").unwrap().unwrap();
        assert!(!record.needs_analysis);
        assert_eq!(record.analysis_result.as_deref(), Some("blood-only analysis"));
        assert_eq!(p.process_pending_analyses().unwrap(), 0);
    }
}
