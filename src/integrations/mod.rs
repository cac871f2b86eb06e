//! Language model integrations.
//!
//! Provides clients for:
//! - OpenAI-compatible chat completions (Groq, OpenAI)
//! - Ollama (local LLM)
//!
//! Both sit behind [`ChatModel`]; [`RetryingChatModel`] adds the fixed
//! attempt/back-off policy every pipeline call goes through.

pub mod ollama;
pub mod openai;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{LlmConfig, LlmProvider};
use crate::Result;

pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use retry::{RetryPolicy, RetryingChatModel};

/// Chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Message list in, text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// Build the configured chat backend.
pub fn chat_model_from_config(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    let model: Arc<dyn ChatModel> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAIClient::from_config(config)?),
        LlmProvider::Ollama => Arc::new(OllamaClient::from_config(config)),
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("a").role, "system");
        assert_eq!(ChatMessage::user("b").role, "user");
        assert_eq!(ChatMessage::user("b").content, "b");
    }

    #[test]
    fn openai_backend_requires_key() {
        let config = LlmConfig {
            provider: LlmProvider::OpenAi,
            base_url: "http://localhost".to_string(),
            api_key: String::new(),
            model: "m".to_string(),
            temperature: 0.3,
            max_tokens: 16,
        };
        assert!(chat_model_from_config(&config).is_err());

        let ollama = LlmConfig {
            provider: LlmProvider::Ollama,
            ..config
        };
        let model = chat_model_from_config(&ollama).unwrap();
        assert_eq!(model.model_name(), "m");
    }
}
