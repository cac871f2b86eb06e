use std::sync::Arc;

use tracing::{debug, info, warn};

use super::thinking::split_think_sections;
use crate::integrations::{ChatMessage, ChatModel, RetryPolicy, RetryingChatModel};
use crate::prompts::{render, Prompt};
use crate::{Error, Result};

/// Model output for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    /// Unmodified model text
    pub raw: String,
    pub thinking: Option<String>,
    /// Text shown to the caller
    pub answer: String,
    /// The provider never answered; `answer` carries the failure
    pub degraded: bool,
}

/// Turns a matched offense and its graph context into a legal answer.
pub struct LegalInterpreter {
    model: RetryingChatModel,
    prompt: String,
}

impl LegalInterpreter {
    pub fn new(model: Arc<dyn ChatModel>, policy: RetryPolicy) -> Self {
        Self {
            model: RetryingChatModel::new(model, policy),
            prompt: Prompt::LegalInterpretation.load_or_builtin(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// A provider that still fails after retries yields a `degraded`
    /// interpretation whose answer is the error text. Only an empty answer
    /// is returned as `Err`.
    pub async fn interpret(&self, offense: &str, context: &str) -> Result<Interpretation> {
        let prompt = render(&self.prompt, &[("offense", offense), ("context", context)]);

        info!("Running inference for {} ({})", offense, self.model.model_name());
        let raw = match self.model.complete(&[ChatMessage::user(prompt)]).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "LLM unavailable after {} attempts: {}",
                    self.model.policy().max_attempts,
                    err
                );
                return Ok(Interpretation {
                    raw: String::new(),
                    thinking: None,
                    answer: format!("Error generating interpretation: {err}"),
                    degraded: true,
                });
            }
        };

        let parsed = split_think_sections(&raw);
        if let Some(thinking) = &parsed.thinking {
            debug!("Stripped {} chars of model reasoning", thinking.len());
        }
        if parsed.answer.is_empty() {
            return Err(Error::Llm(
                "model returned no answer outside its reasoning block".to_string(),
            ));
        }

        Ok(Interpretation {
            raw,
            thinking: parsed.thinking,
            answer: parsed.answer,
            degraded: false,
        })
    }
}
