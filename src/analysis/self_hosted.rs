use serde::{Deserialize, Serialize};

use super::prompt::SELF_HOSTED_SYSTEM_PROMPT;
use super::{AnalysisError, AnalysisOutcome, AnalysisProvider, AnalysisRequest, ANALYSIS_TIMEOUT_SECS};

/// OpenAI-compatible chat-completions server on the local network.
/// Preferred provider when configured.
pub struct SelfHostedProvider {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl SelfHostedProvider {
    /// `base_url` like `http://192.168.1.100:8000`.
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(ANALYSIS_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            client,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    repetition_penalty: f64,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl AnalysisProvider for SelfHostedProvider {
    fn name(&self) -> &'static str {
        "self-hosted"
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let body = ChatCompletionRequest {
            messages: vec![
                ChatMessage { role: "system", content: SELF_HOSTED_SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &request.combined_text },
            ],
            max_tokens: 400,
            temperature: 0.7,
            top_p: 0.9,
            repetition_penalty: 1.1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout(ANALYSIS_TIMEOUT_SECS)
                } else if e.is_connect() {
                    AnalysisError::Connection(self.endpoint.clone())
                } else {
                    AnalysisError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnalysisError::Http { status: status.as_u16(), body });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| AnalysisError::ResponseParsing(e.to_string()))?;

        let analysis = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| AnalysisError::ResponseParsing("response has no choices".into()))?;

        Ok(AnalysisOutcome {
            analysis,
            provider: self.name(),
            model: "self-hosted-llm".into(),
        })
    }
}
