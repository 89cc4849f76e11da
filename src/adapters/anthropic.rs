use crate::adapters::llm::{
    build_client, coerce_content, send_with_retry, LLMAdapter, LLMRequest, LLMResponse,
    ProviderConfig, Usage,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_MAX_TOKENS: usize = 1024;

pub struct AnthropicAdapter {
    client: Client,
    config: ProviderConfig,
    base_url: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Value,
    model: String,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

impl AnthropicAdapter {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com/v1".to_string());
        let client = build_client(&config)?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }
}

#[async_trait]
impl LLMAdapter for AnthropicAdapter {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
        let anthropic_request = AnthropicRequest {
            model: self.config.model_name.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: request.user_prompt,
            }],
            max_tokens: request
                .max_tokens
                .or(self.config.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature.unwrap_or(self.config.temperature),
        };

        let url = format!("{}/messages", self.base_url);
        let response = send_with_retry("Anthropic", self.config.max_retries, || {
            self.client
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&anthropic_request)
        })
        .await
        .context("Failed to send request to Anthropic")?;

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        // Anthropic answers with a list of content blocks.
        let content = coerce_content(&anthropic_response.content);

        Ok(LLMResponse {
            content,
            model: anthropic_response.model,
            usage: anthropic_response.usage.map(|usage| Usage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
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

    #[tokio::test]
    async fn joins_content_blocks_with_spaces() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .match_header("x-api-key", "test_key")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::PartialJson(json!({
                "model": "claude-3",
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": "old code vs new code"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "model": "claude-3",
                    "content": [
                        {"type": "text", "text": "Mocked Anthropic"},
                        {"type": "text", "text": "AI review"}
                    ],
                    "usage": {"input_tokens": 10, "output_tokens": 4}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut config = ProviderConfig::new(Vendor::Anthropic, "claude-3", "test_key");
        config.base_url = Some(server.url());
        let adapter = AnthropicAdapter::new(config).unwrap();

        let response = adapter
            .complete(LLMRequest::new("old code vs new code"))
            .await
            .unwrap();

        assert_eq!(response.content, "Mocked Anthropic AI review");
        assert_eq!(response.usage.unwrap().total_tokens, 14);
        assert_eq!(adapter.model_name(), "claude-3");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/messages")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let mut config = ProviderConfig::new(Vendor::Anthropic, "claude-3", "test_key");
        config.base_url = Some(server.url());
        config.max_retries = 0;
        let adapter = AnthropicAdapter::new(config).unwrap();

        let err = adapter.complete(LLMRequest::new("x")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse Anthropic response"));
    }
}
