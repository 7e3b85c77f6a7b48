//! OpenAI Client
//!
//! LLM client implementation for the OpenAI chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{AiConfig, AiError, AiResult, LlmClient};

pub const DEFAULT_MODEL: &str = "gpt-4o";

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI API client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: AiConfig,
    client: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

impl OpenAiClient {
    pub fn new(config: AiConfig) -> AiResult<Self> {
        if config.api_key.is_empty() {
            return Err(AiError::AuthenticationError);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            config,
            client,
            url: COMPLETIONS_URL.to_string(),
        })
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": &self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
        });
        if let Some(t) = self.config.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(m) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(m);
        }
        body
    }

    async fn call_api(&self, system_prompt: &str, user_prompt: &str) -> AiResult<String> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(system_prompt, user_prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::ApiError(format!("OpenAI API error {}: {}", status, body)));
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::InvalidResponse("OpenAI returned no choices".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> AiResult<String> {
        self.call_api(system_prompt, user_prompt).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}
