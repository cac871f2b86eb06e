//! Fixed-backoff retry around a chat model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{ChatMessage, ChatModel};
use crate::config::{DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
use crate::{Error, Result};

/// How often and how patiently a provider call is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// No delay between attempts (tests, local models).
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_BACKOFF_MS),
        )
    }
}

/// [`ChatModel`] decorator that retries failed calls.
///
/// The last provider error is returned once all attempts are used up.
pub struct RetryingChatModel {
    inner: Arc<dyn ChatModel>,
    policy: RetryPolicy,
}

impl RetryingChatModel {
    pub fn new(inner: Arc<dyn ChatModel>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl ChatModel for RetryingChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut last_err = None;

        for attempt in 1..=self.policy.max_attempts {
            match self.inner.complete(messages).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    warn!(
                        model = self.inner.model_name(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        "LLM call failed: {}",
                        err
                    );
                    last_err = Some(err);
                    if attempt < self.policy.max_attempts && !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Llm("no attempts made".to_string())))
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
