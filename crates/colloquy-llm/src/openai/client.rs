// OpenAI-specific client implementation

use crate::streaming::{parse_chat_sse_stream, StreamEvent};
use crate::traits::{ChatClient, ChatRequest, ChatResponse, TokenUsage};
use crate::types::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    /// Create new client with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    /// Point the client at a different endpoint (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build chat completion request payload
    fn build_chat_request(&self, model: &str, messages: &[Message], stream: bool) -> Result<Value> {
        // Message serializes to the {"role": ..., "content": ...} shape
        // OpenAI expects, so no per-message conversion is needed
        Ok(serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": stream,
        }))
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = self.build_chat_request(&request.model, &request.messages, false)?;

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let raw: OpenAIChatResponse = response
            .json()
            .await
            .context("Failed to parse response")?;

        let choice = raw.choices.first();
        Ok(ChatResponse {
            content: choice.and_then(|c| c.message.content.clone()),
            usage: Some(TokenUsage {
                prompt_tokens: raw.usage.prompt_tokens,
                completion_tokens: raw.usage.completion_tokens,
                total_tokens: raw.usage.total_tokens,
            }),
            finish_reason: choice.and_then(|c| c.finish_reason.clone()),
        })
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        tracing::debug!(model = %request.model, messages = request.messages.len(), "starting chat completion stream");

        let payload = self.build_chat_request(&request.model, &request.messages, true)?;

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        Ok(parse_chat_sse_stream(response))
    }
}

// ============================================================================
// OPENAI-SPECIFIC RESPONSE TYPES (for Chat Completions)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
