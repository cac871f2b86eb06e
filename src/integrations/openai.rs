//! OpenAI-compatible chat completions client (Groq, OpenAI, vLLM...).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, ChatModel};
use crate::config::{LlmConfig, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL};
use crate::{Error, Result};

/// OpenAI-compatible client.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIClient {
    /// Create client with API key and default endpoint/model.
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("LLM API key is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent(concat!("legal_graph_rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 2048,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut client = Self::new(config.api_key.clone())?;
        client.base_url = config.base_url.trim_end_matches('/').to_string();
        client.model = config.model.clone();
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Chat completion.
    pub async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Llm(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Llm(format!("provider error {}: {}", status, text)));
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Llm(format!("invalid response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm("empty response from provider".to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAIClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat_completion(messages).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
