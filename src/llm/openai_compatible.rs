use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError, Message, error_from_response, http_client};
use crate::config::LlmConfig;

/// Generic client for any OpenAI-compatible chat completions API.
///
/// Works with: OpenAI, OpenRouter, Google Gemini, Groq, DeepSeek, Ollama,
/// and any other provider that implements the `/chat/completions` endpoint.
pub struct OpenAICompatibleClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAICompatibleClient {
    pub fn new(config: &LlmConfig, base_url: &str, api_key: String) -> Self {
        Self {
            client: http_client(config),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAICompatibleClient {
    async fn chat(&self, messages: Vec<Message>) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| LlmError::Transport {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("Empty response from LLM".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_config;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> OpenAICompatibleClient {
        let cfg = test_config("openai", &format!("{}/v1/", server.uri()));
        OpenAICompatibleClient::new(&cfg, cfg.base_url.as_deref().unwrap(), "test-key".into())
    }

    #[tokio::test]
    async fn test_chat_sends_model_and_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "max_tokens": 256,
                "messages": [{"role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server).await.chat(vec![Message::user("Hello")]).await.unwrap();
        assert_eq!(reply, "Hi");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient_and_bad_request_is_not() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .mount(&server)
            .await;

        let c = client(&server).await;
        let err = c.chat(vec![Message::user("x")]).await.unwrap_err();
        assert!(err.is_transient(), "{err}");
        let err = c.chat(vec![Message::user("x")]).await.unwrap_err();
        assert!(!err.is_transient(), "{err}");
        assert!(err.to_string().contains("bad model"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;
        let err = client(&server).await.chat(vec![Message::user("x")]).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let cfg = test_config("openai", "http://127.0.0.1:9");
        let c = OpenAICompatibleClient::new(&cfg, "http://127.0.0.1:9", "k".into());
        let err = c.chat(vec![Message::user("x")]).await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }
}
