//! LLM analysis of collated records.
//!
//! Providers implement one trait and are tried in a fixed priority order
//! by [`chain::ProviderChain`]: self-hosted first, then the hosted
//! vendors. First success wins; a record is only marked analyzed after a
//! provider returns text.

pub mod anthropic;
pub mod chain;
pub mod openai;
pub mod prompt;
pub mod self_hosted;

pub use chain::ProviderChain;

use thiserror::Error;

/// Analysis HTTP calls are bounded; a stuck provider must not wedge the
/// batch run.
pub const ANALYSIS_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Connection failed to {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Could not parse provider response: {0}")]
    ResponseParsing(String),

    #[error("No analysis provider configured")]
    NoProviderConfigured,

    #[error("All analysis providers failed")]
    AllProvidersFailed,
}

/// What gets analyzed: the collated text plus the record identity, so
/// providers can frame the request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub combined_text: String,
    pub patient_name: String,
    pub request_id: String,
    pub test_type: String,
}

/// A provider's answer.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: String,
    pub provider: &'static str,
    pub model: String,
}

/// One LLM backend. Calls block, carry their own timeout, and report
/// typed failures so the chain can move on.
pub trait AnalysisProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError>;
}

/// Scripted provider for tests.
pub struct MockProvider {
    name: &'static str,
    result: Result<String, String>,
}

impl MockProvider {
    pub fn succeeding(name: &'static str, analysis: &str) -> Self {
        Self { name, result: Ok(analysis.to_string()) }
    }

    pub fn failing(name: &'static str, reason: &str) -> Self {
        Self { name, result: Err(reason.to_string()) }
    }
}

impl AnalysisProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        match &self.result {
            Ok(analysis) => Ok(AnalysisOutcome {
                analysis: analysis.clone(),
                provider: self.name,
                model: "mock".into(),
            }),
            Err(reason) => Err(AnalysisError::Connection(reason.clone())),
        }
    }
}
