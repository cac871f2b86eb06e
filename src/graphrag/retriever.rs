use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::analysis::embeddings::Embedder;
use crate::analysis::graph_db::GraphStore;
use crate::analysis::models::NodeScope;
use crate::{Error, Result};

/// Node names sent to the embedding provider per call.
pub const DEFAULT_EMBED_BATCH: usize = 64;

/// Snapshot of node-name embeddings taken at build time.
#[derive(Debug, Clone)]
pub struct NodeEmbeddingIndex {
    names: Vec<String>,
    vectors: Vec<Vec<f32>>,
    degraded: bool,
}

impl NodeEmbeddingIndex {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether any vector is a random fallback.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Position and similarity of the best vector; first wins on ties.
    pub fn best_match(&self, query: &[f32]) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, vector) in self.vectors.iter().enumerate() {
            let score = cosine_similarity(query, vector);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((idx, score));
            }
        }
        best
    }
}

/// Best node for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMatch {
    pub node_name: String,
    pub score: f32,
    /// Index or query vector came from the random fallback
    pub low_confidence: bool,
}

/// Maps free text to the closest graph node by name embedding.
///
/// The index is built on first use (or by [`warm`](Self::warm)) and kept
/// until [`invalidate`](Self::invalidate). Concurrent first queries share a
/// single build.
pub struct SimilarityRetriever {
    graph: Arc<dyn GraphStore>,
    embedder: Embedder,
    scope: NodeScope,
    batch_size: usize,
    index: RwLock<Option<Arc<NodeEmbeddingIndex>>>,
    build_lock: Mutex<()>,
}

impl SimilarityRetriever {
    pub fn new(graph: Arc<dyn GraphStore>, embedder: Embedder, scope: NodeScope) -> Self {
        Self {
            graph,
            embedder,
            scope,
            batch_size: DEFAULT_EMBED_BATCH,
            index: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn is_built(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Indexed node count (0 when not built).
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |index| index.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the snapshot; the next query rebuilds it.
    pub fn invalidate(&self) {
        *self.index.write().unwrap_or_else(|e| e.into_inner()) = None;
        info!("Node embedding index invalidated");
    }

    /// Build the index if it is not built yet.
    pub async fn warm(&self) -> Result<usize> {
        Ok(self.index().await?.len())
    }

    /// Rebuild the index from the current graph.
    pub async fn build(&self) -> Result<usize> {
        let _guard = self.build_lock.lock().await;
        let index = Arc::new(self.build_index().await?);
        let len = index.len();
        self.store(index);
        Ok(len)
    }

    /// Most similar node name and its cosine similarity.
    pub async fn find_most_similar(&self, query: &str) -> Result<NodeMatch> {
        let index = self.index().await?;
        let (query_vector, query_degraded) = self.embedder.embed(query).await;

        let (idx, score) = index
            .best_match(&query_vector)
            .ok_or_else(|| Error::Retrieval("node embedding index is empty".to_string()))?;

        let found = NodeMatch {
            node_name: index.names[idx].clone(),
            score: score.clamp(-1.0, 1.0),
            low_confidence: query_degraded || index.is_degraded(),
        };

        if found.low_confidence {
            warn!(
                node = %found.node_name,
                score = found.score,
                "Match is based on fallback embeddings, treat as low confidence"
            );
        } else {
            debug!(node = %found.node_name, score = found.score, "Most similar node");
        }

        Ok(found)
    }

    fn snapshot(&self) -> Option<Arc<NodeEmbeddingIndex>> {
        self.index.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn store(&self, index: Arc<NodeEmbeddingIndex>) {
        *self.index.write().unwrap_or_else(|e| e.into_inner()) = Some(index);
    }

    async fn index(&self) -> Result<Arc<NodeEmbeddingIndex>> {
        if let Some(index) = self.snapshot() {
            return Ok(index);
        }

        let _guard = self.build_lock.lock().await;
        // Another caller may have finished the build while we waited.
        if let Some(index) = self.snapshot() {
            return Ok(index);
        }

        let index = Arc::new(self.build_index().await?);
        self.store(index.clone());
        Ok(index)
    }

    async fn build_index(&self) -> Result<NodeEmbeddingIndex> {
        let names = self.graph.fetch_all_node_names(self.scope).await?;
        if names.is_empty() {
            return Err(Error::Retrieval(
                "No nodes found in the knowledge graph".to_string(),
            ));
        }

        info!("Building embedding index for {} nodes...", names.len());
        let mut vectors = Vec::with_capacity(names.len());
        let mut degraded = false;

        for batch in names.chunks(self.batch_size) {
            let embedded = self.embedder.embed_batch(batch).await;
            degraded |= embedded.degraded;
            vectors.extend(embedded.vectors);
        }

        if degraded {
            warn!("Embedding index contains fallback vectors");
        }
        info!("Embedding index ready: {} nodes", names.len());

        Ok(NodeEmbeddingIndex {
            names,
            vectors,
            degraded,
        })
    }
}

/// `1 - cosine distance`; 0.0 for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}
