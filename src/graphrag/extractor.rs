use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::parser::{parse_tuples, ParseReport};
use crate::analysis::models::OffenseTuple;
use crate::integrations::{ChatMessage, ChatModel, RetryPolicy, RetryingChatModel};
use crate::metrics;
use crate::prompts::{render, Prompt};
use crate::Result;

/// Batched few-shot extraction of offense tuples.
pub struct OffenseExtractor {
    model: RetryingChatModel,
    prompt: String,
}

impl OffenseExtractor {
    /// Uses the extraction prompt from `prompts/` (or the built-in copy).
    pub fn new(model: Arc<dyn ChatModel>, policy: RetryPolicy) -> Self {
        Self {
            model: RetryingChatModel::new(model, policy),
            prompt: Prompt::OffenseExtraction.load_or_builtin(),
        }
    }

    /// Override the prompt template; `{text}` receives the batch.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Label fragments `Text 1:`, `Text 2:` ... and join them.
    pub fn batch_text<S: AsRef<str>>(fragments: &[S]) -> String {
        fragments
            .iter()
            .enumerate()
            .map(|(i, text)| format!("Text {}: {}", i + 1, text.as_ref().trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// One model call (with retries) for one batch.
    pub async fn extract_batch<S: AsRef<str>>(&self, fragments: &[S]) -> Result<ParseReport> {
        let batch = Self::batch_text(fragments);
        let prompt = render(&self.prompt, &[("text", batch.as_str())]);
        let response = self.model.complete(&[ChatMessage::user(prompt)]).await?;
        debug!("Extraction response: {} chars", response.len());
        Ok(parse_tuples(&response))
    }

    /// Extract and deduplicate tuples from all chunks.
    ///
    /// Batches run one after another. A batch whose model call still fails
    /// after retries, or whose output does not parse, contributes nothing;
    /// the run always completes.
    pub async fn extract<S: AsRef<str>>(
        &self,
        chunks: &[S],
        batch_size: usize,
    ) -> BTreeSet<OffenseTuple> {
        let batch_size = batch_size.max(1);
        let total_batches = chunks.len().div_ceil(batch_size);
        let started = Instant::now();
        let mut tuples = BTreeSet::new();

        info!(
            "Extracting from {} chunks in {} batches (model: {})",
            chunks.len(),
            total_batches,
            self.model.model_name()
        );

        for (idx, batch) in chunks.chunks(batch_size).enumerate() {
            match self.extract_batch(batch).await {
                Ok(report) => {
                    for err in &report.rejected {
                        warn!(batch = idx + 1, "Dropped record: {}", err);
                    }
                    for err in &report.invalid {
                        warn!(batch = idx + 1, "Dropped candidate: {}", err);
                    }

                    let before = tuples.len();
                    let parsed = report.tuples.len();
                    tuples.extend(report.tuples);
                    metrics::record_extraction_batch(if parsed > 0 { "ok" } else { "empty" });

                    info!(
                        "Batch {}/{}: {} tuples parsed, {} new, {} total",
                        idx + 1,
                        total_batches,
                        parsed,
                        tuples.len() - before,
                        tuples.len()
                    );
                }
                Err(err) => {
                    metrics::record_extraction_batch("failed");
                    warn!(
                        "Batch {}/{} failed after retries, skipping: {}",
                        idx + 1,
                        total_batches,
                        err
                    );
                }
            }
        }

        info!(
            "Extraction finished: {} unique tuples in {:.1}s",
            tuples.len(),
            started.elapsed().as_secs_f64()
        );
        tuples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned responses; `None` entries fail.
    struct Scripted {
        responses: Mutex<Vec<Option<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(responses: Vec<Option<&str>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push(messages[0].content.clone());
            match self.responses.lock().unwrap().pop() {
                Some(Some(text)) => Ok(text),
                _ => Err(Error::Llm("rate limited".to_string())),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn extractor(model: Arc<Scripted>) -> OffenseExtractor {
        OffenseExtractor::new(model, RetryPolicy::immediate(3)).with_prompt("Extract:\n{text}")
    }

    #[test]
    fn batch_text_labels_fragments() {
        let text = OffenseExtractor::batch_text(&["first ", "second"]);
        assert_eq!(text, "Text 1: first\n\nText 2: second");
    }

    #[tokio::test]
    async fn extracts_single_record() {
        let model = Scripted::new(vec![Some(r#"[["Cheating", "8", "420", "..."]]"#)]);
        let tuples = extractor(model.clone())
            .extract(
                &["Offence: Cheating; Chapter: 8; Section: 420; Punishment: ..."],
                10,
            )
            .await;

        assert_eq!(
            tuples.into_iter().collect::<Vec<_>>(),
            vec![OffenseTuple::new("Cheating", "8", "420", "...")]
        );
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Text 1: Offence: Cheating"));
    }

    #[tokio::test]
    async fn duplicates_across_batches_are_returned_once() {
        let theft = r#"[["Theft", "17", "303", "3 years"]]"#;
        let model = Scripted::new(vec![Some(theft), Some(theft)]);

        let tuples = extractor(model.clone()).extract(&["a", "b", "c"], 2).await;

        assert_eq!(tuples.len(), 1);
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_output_does_not_stop_the_run() {
        let model = Scripted::new(vec![
            Some("Sorry, I cannot help with [[that]]"),
            Some(r#"[["Theft", "17"], ["Robbery", "17", "309", "10 years"]]"#),
            Some(r#"[["Dacoity", "17", "310", "Life imprisonment"]]"#),
        ]);

        let tuples = extractor(model).extract(&["a", "b", "c"], 1).await;

        // The second batch mixes a short record into its list, so none of it is kept
        assert_eq!(
            tuples.into_iter().collect::<Vec<_>>(),
            vec![OffenseTuple::new("Dacoity", "17", "310", "Life imprisonment")]
        );
    }

    #[tokio::test]
    async fn failing_batch_is_skipped_after_retries() {
        // First batch: three failures. Second batch: success.
        let model = Scripted::new(vec![
            None,
            None,
            None,
            Some(r#"[["Murder", "6", "103", "Death"]]"#),
        ]);

        let tuples = extractor(model.clone()).extract(&["a", "b"], 1).await;

        assert_eq!(tuples.len(), 1);
        assert_eq!(model.prompts.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn zero_batch_size_is_treated_as_one() {
        let model = Scripted::new(vec![Some("[]"), Some("[]")]);
        let tuples = extractor(model.clone()).extract(&["a", "b"], 0).await;

        assert!(tuples.is_empty());
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
    }
}
