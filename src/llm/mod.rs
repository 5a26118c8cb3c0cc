pub mod anthropic;
pub mod openai_compatible;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

// --- Message ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

// --- Errors ---

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("No API key configured for provider '{0}'")]
    MissingApiKey(String),
    #[error("LLM API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("Network error calling {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether a later attempt could succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || status.is_server_error()
            }
            LlmError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            LlmError::MissingApiKey(_) | LlmError::InvalidResponse(_) => false,
        }
    }
}

// --- LLM Client trait ---

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one conversation and return the assistant's text.
    async fn chat(&self, messages: Vec<Message>) -> Result<String, LlmError>;
}

// --- Factory ---

pub fn create_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>, LlmError> {
    let api_key = config
        .resolve_api_key()
        .ok_or_else(|| LlmError::MissingApiKey(config.provider.clone()))?;

    match config.provider.as_str() {
        "anthropic" => Ok(Box::new(anthropic::AnthropicClient::new(config, api_key))),
        provider => {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url(provider).to_string());
            Ok(Box::new(openai_compatible::OpenAICompatibleClient::new(
                config, &base_url, api_key,
            )))
        }
    }
}

fn default_base_url(provider: &str) -> &str {
    match provider {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "google" | "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai",
        "groq" => "https://api.groq.com/openai/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "ollama" => "http://localhost:11434/v1",
        _ => "https://api.openai.com/v1",
    }
}

fn http_client(config: &LlmConfig) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {e}");
            Client::new()
        })
}

/// Map a non-success response into [`LlmError::Api`].
async fn error_from_response(response: reqwest::Response) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    LlmError::Api { status, body }
}

#[cfg(test)]
pub(crate) fn test_config(provider: &str, base_url: &str) -> LlmConfig {
    LlmConfig {
        provider: provider.into(),
        base_url: Some(base_url.into()),
        model: "test-model".into(),
        api_key: Some("test-key".into()),
        api_key_env: None,
        max_tokens: 256,
        timeout_secs: 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_requires_api_key() {
        let mut cfg = test_config("openai", "http://localhost:1");
        cfg.api_key = None;
        assert!(matches!(create_client(&cfg), Err(LlmError::MissingApiKey(p)) if p == "openai"));
        cfg.api_key = Some("k".into());
        assert!(create_client(&cfg).is_ok());
    }

    #[test]
    fn test_api_error_classification() {
        let api = |code: u16| LlmError::Api {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };
        assert!(api(429).is_transient());
        assert!(api(408).is_transient());
        assert!(api(500).is_transient());
        assert!(api(503).is_transient());
        assert!(!api(400).is_transient());
        assert!(!api(401).is_transient());
        assert!(!api(404).is_transient());
        assert!(!LlmError::MissingApiKey("x".into()).is_transient());
        assert!(!LlmError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn test_default_base_urls() {
        assert_eq!(default_base_url("openai"), "https://api.openai.com/v1");
        assert!(default_base_url("google").contains("generativelanguage"));
        assert_eq!(default_base_url("unknown"), "https://api.openai.com/v1");
    }
}
