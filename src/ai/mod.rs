//! LLM oracle clients
//!
//! The language model is treated as an untrusted text-completion service:
//! prompt in, text out, explicit error. Everything it returns is checked by
//! the SQL policy before it can reach the datastore.
//!
//! ## Backend Selection
//!
//! Set `LLM_BACKEND`:
//! - `gemini` (default): Google Gemini generateContent API
//! - `openai`: OpenAI chat completions API

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Oracle client configuration.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: gemini::DEFAULT_MODEL.to_string(),
            max_tokens: Some(2048),
            temperature: Some(0.1),
            timeout_seconds: 60,
        }
    }
}

impl AiConfig {
    /// Same credentials and limits, different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: missing API key")]
    AuthenticationError,
}

pub type AiResult<T> = Result<T, AiError>;

/// Text-completion oracle.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> AiResult<String>;

    fn model_name(&self) -> &str;

    fn provider_name(&self) -> &str;
}

/// Which provider backs the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmBackend {
    #[default]
    Gemini,
    OpenAi,
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown LLM backend '{other}' (expected gemini or openai)")),
        }
    }
}

/// Build a client for `backend` from `config`.
pub fn create_llm_client(backend: LlmBackend, config: AiConfig) -> AiResult<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match backend {
        LlmBackend::Gemini => Arc::new(GeminiClient::new(config)?),
        LlmBackend::OpenAi => Arc::new(OpenAiClient::new(config)?),
    };
    tracing::info!(
        provider = client.provider_name(),
        model = client.model_name(),
        "LLM client ready"
    );
    Ok(client)
}

/// Strip markdown code fencing (```sql ... ```) from a raw completion.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    for line in trimmed.lines() {
        let l = line.trim_start();
        if l.starts_with("```") {
            // Anything after the fence on the same line is a language tag.
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
