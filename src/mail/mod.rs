//! Mail intake.
//!
//! A [`MailSource`] hands the processor recent messages with their PDF
//! attachments already read into memory. The directory source consumes a
//! drop folder of JSON manifests, one per message, each pointing at
//! attachment files alongside it.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{InboundMessage, PdfAttachment};

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad message manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("Attachment not found: {0}")]
    MissingAttachment(String),
}

/// Where messages come from. `complete` is called once a message's
/// outcome is durably recorded; a message never completed must show up in
/// a later `fetch_recent` so a crash mid-batch does not lose it.
pub trait MailSource: Send {
    fn fetch_recent(&mut self, max: usize) -> Result<Vec<InboundMessage>, MailError>;

    fn complete(&mut self, message_id: &str) -> Result<(), MailError> {
        let _ = message_id;
        Ok(())
    }
}

#[derive(Deserialize)]
struct MessageManifest {
    message_id: String,
    subject: String,
    #[serde(default)]
    sender: String,
    #[serde(default)]
    attachments: Vec<String>,
}

/// Drop-folder source. Each `*.json` file in the inbox directory is one
/// message manifest; attachment paths resolve relative to the inbox.
/// Manifests are read oldest filename first and renamed with a `.done`
/// suffix only on [`MailSource::complete`], after the processor has
/// recorded the message, so an interrupted run replays from the folder
/// and the processed-email history suppresses actual rework.
pub struct DirectoryMailSource {
    inbox_dir: PathBuf,
    in_flight: HashMap<String, PathBuf>,
}

impl DirectoryMailSource {
    pub fn new(inbox_dir: impl Into<PathBuf>) -> Self {
        Self { inbox_dir: inbox_dir.into(), in_flight: HashMap::new() }
    }

    fn load_message(&self, manifest_path: &PathBuf) -> Result<InboundMessage, MailError> {
        let raw = fs::read_to_string(manifest_path)?;
        let manifest: MessageManifest =
            serde_json::from_str(&raw).map_err(|e| MailError::Manifest {
                path: manifest_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut attachments = Vec::with_capacity(manifest.attachments.len());
        for name in &manifest.attachments {
            let path = self.inbox_dir.join(name);
            let data = fs::read(&path)
                .map_err(|_| MailError::MissingAttachment(path.display().to_string()))?;
            attachments.push(PdfAttachment { filename: name.clone(), data });
        }

        Ok(InboundMessage {
            message_id: manifest.message_id,
            subject: manifest.subject,
            sender: manifest.sender,
            attachments,
        })
    }
}

impl MailSource for DirectoryMailSource {
    fn fetch_recent(&mut self, max: usize) -> Result<Vec<InboundMessage>, MailError> {
        let mut manifest_paths: Vec<PathBuf> = fs::read_dir(&self.inbox_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        manifest_paths.sort();
        manifest_paths.truncate(max);

        let mut messages = Vec::new();
        for path in manifest_paths {
            match self.load_message(&path) {
                Ok(message) => {
                    debug!(message_id = %message.message_id, "Loaded inbox message");
                    self.in_flight.insert(message.message_id.clone(), path);
                    messages.push(message);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable inbox message");
                }
            }
        }
        Ok(messages)
    }

    fn complete(&mut self, message_id: &str) -> Result<(), MailError> {
        if let Some(path) = self.in_flight.remove(message_id) {
            let done = path.with_extension("json.done");
            fs::rename(&path, &done)?;
        }
        Ok(())
    }
}

/// Scripted source for tests.
pub struct InMemoryMailSource {
    queue: Vec<InboundMessage>,
}

impl InMemoryMailSource {
    pub fn new(messages: Vec<InboundMessage>) -> Self {
        Self { queue: messages }
    }
}

impl MailSource for InMemoryMailSource {
    fn fetch_recent(&mut self, max: usize) -> Result<Vec<InboundMessage>, MailError> {
        let take = max.min(self.queue.len());
        Ok(self.queue.drain(..take).collect())
    }
}
