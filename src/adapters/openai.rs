use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::adapters::llm::{
    build_client, coerce_content, send_with_retry, LLMAdapter, LLMRequest, LLMResponse,
    ProviderConfig, Usage,
};

pub struct OpenAIAdapter {
    client: Client,
    config: ProviderConfig,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<OpenAIUsage>,
    model: String,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Value,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

impl OpenAIAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let base_url = config.base_url.clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let client = build_client(&config)?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
        let openai_request = OpenAIRequest {
            model: self.config.model_name.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.user_prompt,
            }],
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = send_with_retry("OpenAI", self.config.max_retries, || {
            self.client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .header("Content-Type", "application/json")
                .json(&openai_request)
        })
        .await
        .context("Failed to send request to OpenAI")?;

        let openai_response: OpenAIResponse = response.json().await
            .context("Failed to parse OpenAI response")?;

        let content = openai_response.choices
            .first()
            .map(|c| coerce_content(&c.message.content))
            .context("OpenAI response contained no choices")?;

        Ok(LLMResponse {
            content,
            model: openai_response.model,
            usage: openai_response.usage.map(|usage| Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm::Vendor;
    use mockito::Matcher;
    use serde_json::json;

    fn config_for(server: &mockito::Server) -> ProviderConfig {
        let mut config = ProviderConfig::new(Vendor::OpenAi, "gpt-3.5-turbo", "test_key");
        config.base_url = Some(server.url());
        config.temperature = 0.7;
        config.max_retries = 1;
        config
    }

    #[tokio::test]
    async fn sends_single_user_message_and_reads_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test_key")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "review this"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "model": "gpt-3.5-turbo",
                    "choices": [{"message": {"role": "assistant", "content": "Mocked AI review"}}],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 3, "total_tokens": 6}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(config_for(&server)).unwrap();
        let response = adapter.complete(LLMRequest::new("review this")).await.unwrap();

        assert_eq!(response.content, "Mocked AI review");
        assert_eq!(response.usage.unwrap().total_tokens, 6);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retries_server_errors_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .expect(2)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(config_for(&server)).unwrap();
        let err = adapter.complete(LLMRequest::new("x")).await.unwrap_err();

        assert!(format!("{:#}", err).contains("503"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("bad key")
            .expect(1)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(config_for(&server)).unwrap();
        assert!(adapter.complete(LLMRequest::new("x")).await.is_err());
        mock.assert_async().await;
    }
}
