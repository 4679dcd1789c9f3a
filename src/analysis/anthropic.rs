use serde::{Deserialize, Serialize};

use super::prompt::{framed_request, VENDOR_SYSTEM_PROMPT};
use super::{AnalysisError, AnalysisOutcome, AnalysisProvider, AnalysisRequest, ANALYSIS_TIMEOUT_SECS};

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MODEL: &str = "claude-3-sonnet-20240229";

/// Last provider in the chain.
pub struct AnthropicProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, ANTHROPIC_ENDPOINT)
    }

    /// Endpoint override for tests.
    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(ANALYSIS_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    text: String,
}

impl AnalysisProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let framed = framed_request(request);
        let body = AnthropicRequest {
            model: ANTHROPIC_MODEL,
            max_tokens: 4000,
            temperature: 0.1,
            system: VENDOR_SYSTEM_PROMPT,
            messages: vec![AnthropicMessage { role: "user", content: &framed }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout(ANALYSIS_TIMEOUT_SECS)
                } else {
                    AnalysisError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnalysisError::Http { status: status.as_u16(), body });
        }

        let parsed: AnthropicResponse = response
            .json()
            .map_err(|e| AnalysisError::ResponseParsing(e.to_string()))?;

        let analysis = parsed
            .content
            .first()
            .map(|block| block.text.trim().to_string())
            .ok_or_else(|| AnalysisError::ResponseParsing("response has no content blocks".into()))?;

        Ok(AnalysisOutcome {
            analysis,
            provider: self.name(),
            model: ANTHROPIC_MODEL.into(),
        })
    }
}
