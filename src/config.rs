use std::env;
use std::path::PathBuf;

use crate::analysis::{
    anthropic::AnthropicProvider, openai::OpenAiProvider, self_hosted::SelfHostedProvider,
    AnalysisProvider, ProviderChain,
};

/// Application-level constants
pub const APP_NAME: &str = "MedCollate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_SELF_HOSTED_PORT: u16 = 8000;
const DEFAULT_MAX_PDF_SIZE_MB: usize = 50;
const DEFAULT_MAX_EMAILS: usize = 20;

/// Environment-driven runtime configuration. Read once at startup; a
/// `.env` file in the working directory is honored before these lookups.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub inbox_dir: PathBuf,
    pub max_emails: usize,
    pub max_pdf_size_mb: usize,
    pub use_self_hosted_llm: bool,
    pub self_hosted_llm_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let self_hosted_llm_url = env::var("SELF_HOSTED_LLM_URL").ok().map(|host| {
            let port = env::var("SELF_HOSTED_LLM_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SELF_HOSTED_PORT);
            if host.starts_with("http") {
                format!("{host}:{port}")
            } else {
                format!("http://{host}:{port}")
            }
        });

        Self {
            database_path: env::var("MEDCOLLATE_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| app_data_dir().join("medcollate.db")),
            inbox_dir: env::var("MEDCOLLATE_INBOX")
                .map(PathBuf::from)
                .unwrap_or_else(|_| app_data_dir().join("inbox")),
            max_emails: env::var("MEDCOLLATE_MAX_EMAILS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_EMAILS),
            max_pdf_size_mb: env::var("MAX_PDF_SIZE_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_PDF_SIZE_MB),
            use_self_hosted_llm: env::var("USE_SELF_HOSTED_LLM")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            self_hosted_llm_url,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }

    /// Providers in fallback order: self-hosted first when enabled, then
    /// OpenAI, then Anthropic. The chain may be empty; analysis then
    /// stays pending until a provider is configured.
    pub fn build_provider_chain(&self) -> ProviderChain {
        let mut providers: Vec<Box<dyn AnalysisProvider>> = Vec::new();

        if self.use_self_hosted_llm {
            if let Some(url) = &self.self_hosted_llm_url {
                providers.push(Box::new(SelfHostedProvider::new(url)));
            }
        }
        if let Some(key) = &self.openai_api_key {
            providers.push(Box::new(OpenAiProvider::new(key)));
        }
        if let Some(key) = &self.anthropic_api_key {
            providers.push(Box::new(AnthropicProvider::new(key)));
        }

        ProviderChain::new(providers)
    }

    pub fn max_pdf_size_bytes(&self) -> usize {
        self.max_pdf_size_mb * 1024 * 1024
    }
}

/// Filter used when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Get the application data directory
/// ~/MedCollate/ on all platforms
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("MedCollate")
}
