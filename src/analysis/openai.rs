use serde::{Deserialize, Serialize};

use super::prompt::{framed_request, VENDOR_SYSTEM_PROMPT};
use super::{AnalysisError, AnalysisOutcome, AnalysisProvider, AnalysisRequest, ANALYSIS_TIMEOUT_SECS};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-4-turbo-preview";

/// First hosted fallback after the self-hosted provider.
pub struct OpenAiProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, OPENAI_ENDPOINT)
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
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

impl AnalysisProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let framed = framed_request(request);
        let body = OpenAiChatRequest {
            model: OPENAI_MODEL,
            messages: vec![
                OpenAiMessage { role: "system", content: VENDOR_SYSTEM_PROMPT },
                OpenAiMessage { role: "user", content: &framed },
            ],
            max_tokens: 4000,
            // Low temperature for consistent medical analysis
            temperature: 0.1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
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

        let parsed: OpenAiChatResponse = response
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
            model: OPENAI_MODEL.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parsing_extracts_first_choice() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":" analysis text "}}]}"#;
        let parsed: OpenAiChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, " analysis text ");
    }

    #[test]
    fn request_uses_low_temperature() {
        let body = OpenAiChatRequest {
            model: OPENAI_MODEL,
            messages: vec![],
            max_tokens: 4000,
            temperature: 0.1,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4-turbo-preview");
        assert_eq!(json["temperature"], 0.1);
    }
}
