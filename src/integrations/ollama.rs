//! Ollama client for local LLM inference.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatModel};
use crate::config::{LlmConfig, DEFAULT_OLLAMA_URL};
use crate::{Error, Result};

/// Ollama client for local LLM.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    /// Create client with custom URL.
    pub fn with_url(base_url: &str, model: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.3,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        let base_url = if config.base_url.is_empty() {
            DEFAULT_OLLAMA_URL
        } else {
            config.base_url.as_str()
        };
        let mut client = Self::with_url(base_url, &config.model);
        client.temperature = config.temperature;
        client
    }

    /// Check if Ollama server is running.
    pub async fn is_running(&self) -> bool {
        self.http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Chat with model.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("Ollama error {}: {}", status, text)));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("invalid response: {}", e)))?;

        Ok(result.message.content)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat(messages).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}
