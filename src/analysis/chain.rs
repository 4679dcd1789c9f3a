use super::{AnalysisError, AnalysisOutcome, AnalysisProvider, AnalysisRequest};

/// Ordered list of providers. Not a scoring scheme: providers are tried
/// top to bottom and the first success is returned.
pub struct ProviderChain {
    providers: Vec<Box<dyn AnalysisProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn AnalysisProvider>>) -> Self {
        Self { providers }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        if self.providers.is_empty() {
            return Err(AnalysisError::NoProviderConfigured);
        }

        for provider in &self.providers {
            match provider.analyze(request) {
                Ok(outcome) => {
                    tracing::info!(
                        provider = provider.name(),
                        request_id = %request.request_id,
                        "Analysis completed"
                    );
                    return Ok(outcome);
                }
                Err(e) => {
                    tracing::error!(
                        provider = provider.name(),
                        request_id = %request.request_id,
                        error = %e,
                        "Analysis provider failed, trying next"
                    );
                }
            }
        }

        Err(AnalysisError::AllProvidersFailed)
    }
}
