use crate::config::ConfigError;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    OpenAi,
    Anthropic,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "openai",
            Vendor::Anthropic => "anthropic",
        }
    }

    /// Environment variable consulted when no API key is given explicitly.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "OPENAI_API_KEY",
            Vendor::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl FromStr for Vendor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Vendor::OpenAi),
            "anthropic" => Ok(Vendor::Anthropic),
            other => Err(ConfigError::UnsupportedVendor(other.to_string())),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::OpenAi => write!(f, "Openai"),
            Vendor::Anthropic => write!(f, "Anthropic"),
        }
    }
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub vendor: Vendor,
    pub model_name: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub timeout: Option<Duration>,
    pub max_retries: usize,
}

impl ProviderConfig {
    pub fn new(vendor: Vendor, model_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            vendor,
            model_name: model_name.into(),
            api_key: api_key.into(),
            base_url: None,
            temperature: 0.0,
            max_tokens: None,
            timeout: None,
            max_retries: 2,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey(self.vendor.api_key_env()));
        }
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }
}

// The API key must never reach logs or diagnostics.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("vendor", &self.vendor)
            .field("model_name", &self.model_name)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub user_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse>;
    fn model_name(&self) -> &str;
}

pub fn create_adapter(config: &ProviderConfig) -> Result<Box<dyn LLMAdapter>> {
    match config.vendor {
        Vendor::OpenAi => Ok(Box::new(crate::adapters::OpenAIAdapter::new(config.clone())?)),
        Vendor::Anthropic => Ok(Box::new(crate::adapters::AnthropicAdapter::new(
            config.clone(),
        )?)),
    }
}

pub(crate) fn build_client(config: &ProviderConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Sends a request, retrying transport errors, 429 and 5xx responses up to
/// `max_retries` extra times with linear backoff.
pub(crate) async fn send_with_retry<F>(
    vendor: &str,
    max_retries: usize,
    mut make_request: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    const BASE_DELAY_MS: u64 = 250;

    for attempt in 0..=max_retries {
        match make_request().send().await {
            Ok(response) => {
                if response.status().is_success() {
                    return Ok(response);
                }

                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if is_retryable_status(status) && attempt < max_retries {
                    tracing::debug!("{} returned {}, retrying (attempt {})", vendor, status, attempt + 1);
                    sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))).await;
                    continue;
                }

                anyhow::bail!("{} API error ({}): {}", vendor, status, body);
            }
            Err(err) => {
                if attempt < max_retries {
                    tracing::debug!("{} request failed: {}, retrying (attempt {})", vendor, err, attempt + 1);
                    sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1))).await;
                    continue;
                }
                return Err(err.into());
            }
        }
    }

    anyhow::bail!("{} request failed after retries", vendor);
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Flattens a vendor message body into plain text. Lists of content blocks
/// are joined with a single space in the order returned.
pub fn coerce_content(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(content_segment)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

fn content_segment(item: &Value) -> String {
    match item {
        Value::String(text) => text.clone(),
        Value::Object(block) => match block.get("text") {
            Some(Value::String(text)) => text.clone(),
            _ => item.to_string(),
        },
        other => other.to_string(),
    }
}
