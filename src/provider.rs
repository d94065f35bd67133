//! Model Provider Abstraction
//!
//! The generation API as seen by the pipeline: one chat-completion call per prompt.
//! The shipped client speaks the OpenAI-compatible `/chat/completions` protocol and
//! maps every failure onto a `ProviderError` class so the retry policy can judge it.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Completion options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: Option<f32>, // 0.0-2.0
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature: Some(temperature),
            max_tokens: None,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

/// Model provider client trait
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Generate a completion from a list of messages
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

// OpenAI-compatible API request/response structures
#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn role_to_string(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

/// Map a non-success HTTP status onto an error class
pub fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        400 | 404 | 422 => ProviderError::InvalidRequest(format!("{}: {}", status, body)),
        401 => ProviderError::Authentication(body.to_string()),
        403 => ProviderError::PermissionDenied(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        408 | 504 => ProviderError::Timeout(format!("{}: {}", status, body)),
        503 => ProviderError::ServiceUnavailable(body.to_string()),
        500 | 502 => ProviderError::Api(format!("{}: {}", status, body)),
        _ => ProviderError::Unclassified(format!("{}: {}", status, body)),
    }
}

// Transport-level failures (no response, or a body we could not read)
fn map_http_error(error: reqwest::Error) -> ProviderError {
    if let Some(status) = error.status() {
        classify_status(status, &error.to_string())
    } else if error.is_timeout() {
        ProviderError::Timeout(error.to_string())
    } else if error.is_connect() {
        ProviderError::Connection(error.to_string())
    } else if error.is_decode() || error.is_body() {
        ProviderError::Api(format!("Failed to read response: {}", error))
    } else if error.is_builder() {
        ProviderError::InvalidRequest(error.to_string())
    } else {
        ProviderError::Unclassified(error.to_string())
    }
}

fn build_provider_http_client(config: &ProviderConfig) -> Result<Client, ProviderError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ProviderError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))
}

/// OpenAI-compatible provider client
pub struct OpenAIClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    max_tokens: Option<u32>,
}

impl OpenAIClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = build_provider_http_client(config)?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ModelProviderClient for OpenAIClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = ChatCompletionRequest {
            model: options.model,
            messages: messages
                .into_iter()
                .map(|msg| OpenAIMessage {
                    role: role_to_string(msg.role).to_string(),
                    content: Some(msg.content),
                })
                .collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens.or(self.max_tokens),
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, &error_text));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(map_http_error)?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Api("No choices in response".to_string()))?;
        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::Api("Empty message in response".to_string()))?;

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();
        debug!(
            model = %completion.model,
            total_tokens = usage.total_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            model: completion.model,
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

// Mock provider for testing: replays scripted results in order, records prompts
#[cfg(test)]
pub struct MockProvider {
    script: parking_lot::Mutex<std::collections::VecDeque<Result<String, ProviderError>>>,
    prompts: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: parking_lot::Mutex::new(script.into()),
            prompts: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ModelProviderClient for MockProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().push(prompt.clone());
        let next = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("echo: {}", prompt)));
        next.map(|content| CompletionResponse {
            content,
            model: "mock".to_string(),
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
