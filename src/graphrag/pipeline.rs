//! Query pipeline: node match, context, interpretation.

use std::sync::Arc;

use futures::Stream;
use serde::Serialize;
use tracing::{debug, error, info};

use super::context::ContextAssembler;
use super::events::{failure_report, AnalyzeData, AnalyzeResponse, Stage, StreamEvent};
use super::interpreter::LegalInterpreter;
use super::retriever::SimilarityRetriever;
use crate::analysis::embeddings::Embedder;
use crate::analysis::graph_db::GraphStore;
use crate::config::RetrievalConfig;
use crate::integrations::{ChatModel, RetryPolicy};
use crate::metrics;
use crate::{Error, Result};

/// Readiness of the pipeline's collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub graph_connected: bool,
    pub llm_ready: bool,
    pub index_built: bool,
    pub indexed_nodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offense_count: Option<u64>,
    pub model: String,
    pub embedding_provider: &'static str,
}

/// Answers legal questions from the knowledge graph.
pub struct LegalAssistant {
    graph: Arc<dyn GraphStore>,
    retriever: SimilarityRetriever,
    assembler: ContextAssembler,
    interpreter: LegalInterpreter,
}

impl LegalAssistant {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        embedder: Embedder,
        model: Arc<dyn ChatModel>,
        retrieval: &RetrievalConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            retriever: SimilarityRetriever::new(graph.clone(), embedder, retrieval.scope),
            assembler: ContextAssembler::new(graph.clone(), retrieval.hops),
            interpreter: LegalInterpreter::new(model, retry),
            graph,
        }
    }

    /// Replace the interpretation prompt template.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.interpreter = self.interpreter.with_prompt(prompt);
        self
    }

    pub fn retriever(&self) -> &SimilarityRetriever {
        &self.retriever
    }

    fn validate(query: &str) -> Result<&str> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidArgument("Query cannot be empty".to_string()));
        }
        Ok(query)
    }

    /// Run every stage and return one structured result.
    ///
    /// Only request validation fails with `Err`; a failing stage is reported
    /// as [`AnalyzeResponse::Error`].
    pub async fn analyze(&self, query: &str) -> Result<AnalyzeResponse> {
        let query = Self::validate(query)?;

        let response = match self.run(query).await {
            Ok(data) => AnalyzeResponse::Success { data },
            Err((stage, err)) => {
                error!(%stage, "Query failed: {}", err);
                let (error, traceback) = failure_report(stage, &err);
                AnalyzeResponse::Error { error, traceback }
            }
        };

        metrics::record_query(response.is_success());
        Ok(response)
    }

    async fn run(&self, query: &str) -> std::result::Result<AnalyzeData, (Stage, Error)> {
        let found = self
            .retriever
            .find_most_similar(query)
            .await
            .map_err(|e| (Stage::FindingNode, e))?;

        let context = self
            .assembler
            .get_context(&found.node_name)
            .await
            .map_err(|e| (Stage::FetchingContext, e))?;

        let interpretation = self
            .interpreter
            .interpret(&found.node_name, &context)
            .await
            .map_err(|e| (Stage::GeneratingAnswer, e))?;

        Ok(AnalyzeData {
            answer: interpretation.answer,
            matched_node: found.node_name,
            similarity_score: found.score,
            context,
        })
    }

    /// Stream progress events while answering.
    ///
    /// Events come in the order `log, matched_node, log, context, log,
    /// answer, complete`. A language model that stays down is reported in
    /// the `answer` text. Any other failing stage yields one `error` event
    /// and ends the stream. Each stage starts only when the consumer polls past the
    /// previous event.
    pub fn analyze_stream<'a>(
        &'a self,
        query: &str,
    ) -> Result<impl Stream<Item = StreamEvent> + 'a> {
        let query = Self::validate(query)?.to_string();

        Ok(async_stream::stream! {
            debug!(stage = %Stage::Start, "Streaming query: {}", query);

            yield StreamEvent::log("Finding most similar node...");
            let found = match self.retriever.find_most_similar(&query).await {
                Ok(found) => found,
                Err(err) => {
                    yield Self::failed(Stage::FindingNode, &err);
                    return;
                }
            };
            info!(
                stage = %Stage::NodeFound,
                "Similar Node Found: {} (Score: {:.2})", found.node_name, found.score
            );
            yield StreamEvent::MatchedNode {
                node_name: found.node_name.clone(),
                similarity_score: found.score,
            };

            yield StreamEvent::log("Fetching context for LLM...");
            let context = match self.assembler.get_context(&found.node_name).await {
                Ok(context) => context,
                Err(err) => {
                    yield Self::failed(Stage::FetchingContext, &err);
                    return;
                }
            };
            debug!(stage = %Stage::ContextReady, "Context: {} chars", context.len());
            yield StreamEvent::Context { context: context.clone() };

            yield StreamEvent::log("Running inference...");
            let interpretation = match self.interpreter.interpret(&found.node_name, &context).await {
                Ok(interpretation) => interpretation,
                Err(err) => {
                    yield Self::failed(Stage::GeneratingAnswer, &err);
                    return;
                }
            };
            yield StreamEvent::Answer { answer: interpretation.answer };

            metrics::record_query(true);
            debug!(stage = %Stage::Complete, "Query answered");
            yield StreamEvent::Complete;
        })
    }

    fn failed(stage: Stage, err: &Error) -> StreamEvent {
        error!(%stage, "Query failed: {}", err);
        metrics::record_query(false);
        let (message, traceback) = failure_report(stage, err);
        StreamEvent::Error { message, traceback }
    }

    pub async fn health(&self) -> HealthReport {
        let offense_count = match self.graph.count_offenses().await {
            Ok(count) => Some(count),
            Err(err) => {
                error!("Graph health probe failed: {}", err);
                None
            }
        };
        let graph_connected = offense_count.is_some();

        HealthReport {
            status: if graph_connected { "healthy" } else { "degraded" },
            graph_connected,
            llm_ready: true,
            index_built: self.retriever.is_built(),
            indexed_nodes: self.retriever.len(),
            offense_count,
            model: self.interpreter.model_name().to_string(),
            embedding_provider: self.retriever.embedder().provider(),
        }
    }
}
