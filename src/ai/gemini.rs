//! Google Gemini API client
//!
//! Talks to the `generateContent` REST endpoint. System and user prompts are
//! sent as a single text part, which is how the college assistant prompts
//! were always delivered.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{AiConfig, AiError, AiResult, LlmClient};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: AiConfig,
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

impl GeminiClient {
    pub fn new(config: AiConfig) -> AiResult<Self> {
        Self::with_base_url(config, BASE_URL)
    }

    /// Point the client at a different endpoint root (proxies, test servers).
    pub fn with_base_url(config: AiConfig, base_url: impl Into<String>) -> AiResult<Self> {
        if config.api_key.is_empty() {
            return Err(AiError::AuthenticationError);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(AiError::HttpError)?;

        Ok(Self {
            config,
            client,
            base_url: base_url.into(),
        })
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str) -> GeminiRequest {
        let full_prompt = if system_prompt.is_empty() {
            user_prompt.to_string()
        } else {
            format!("{}\n\n{}", system_prompt, user_prompt)
        };

        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: full_prompt }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            }),
        }
    }

    async fn send_request(&self, system_prompt: &str, user_prompt: &str) -> AiResult<String> {
        let url = format!("{}/{}:generateContent", self.base_url, self.config.model);
        debug!(model = %self.config.model, "Sending request to Gemini API");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.build_request(system_prompt, user_prompt))
            .send()
            .await
            .map_err(AiError::HttpError)?;

        let status = response.status();
        let response_text = response.text().await.map_err(AiError::HttpError)?;

        if !status.is_success() {
            error!("Gemini API error: {} - {}", status, response_text);
            return Err(AiError::ApiError(format!(
                "HTTP {}: {}",
                status, response_text
            )));
        }

        let gemini_response: GeminiResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                error!("Failed to parse Gemini response: {}", e);
                AiError::JsonError(e)
            })?;

        extract_text(gemini_response)
    }
}

fn extract_text(response: GeminiResponse) -> AiResult<String> {
    if let Some(usage) = &response.usage_metadata {
        info!(
            "Gemini API usage - Prompt: {:?} tokens, Response: {:?} tokens",
            usage.prompt_token_count, usage.candidates_token_count
        );
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AiError::InvalidResponse("No candidates in response".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AiError::InvalidResponse(
            "Empty text in candidate".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> AiResult<String> {
        self.send_request(system_prompt, user_prompt).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn provider_name(&self) -> &str {
        "Gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> AiConfig {
        AiConfig {
            api_key: "test-key".to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: Some(1024),
            temperature: Some(0.1),
            timeout_seconds: 30,
        }
    }

    #[test]
    fn test_gemini_client_creation() {
        let client = GeminiClient::new(create_test_config()).unwrap();
        assert_eq!(client.model_name(), DEFAULT_MODEL);
        assert_eq!(client.provider_name(), "Gemini");
    }

    #[test]
    fn test_missing_key_rejected() {
        let config = AiConfig {
            api_key: String::new(),
            ..create_test_config()
        };
        assert!(matches!(
            GeminiClient::new(config),
            Err(AiError::AuthenticationError)
        ));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let client = GeminiClient::new(create_test_config()).unwrap();
        let body = serde_json::to_value(client.build_request("sys", "user")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "sys\n\nuser");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let raw = r#"{
            "candidates": [{"content": {"parts": [{"text": "SELECT "}, {"text": "1"}]}}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 2}
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            extract_text(parsed),
            Err(AiError::InvalidResponse(_))
        ));
    }
}
