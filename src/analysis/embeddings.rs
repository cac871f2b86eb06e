//! Embedding providers and the degrading [`Embedder`] adapter.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAIClient,
};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::metrics;
use crate::{Error, Result};

const HF_PIPELINE_URL: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction";

/// Text in, fixed-dimension vectors out.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn name(&self) -> &'static str;
}

/// Hugging Face feature-extraction inference API.
pub struct HuggingFaceEmbeddings {
    http: Client,
    url: String,
    token: Option<String>,
    dimension: usize,
}

impl HuggingFaceEmbeddings {
    pub fn new(model: &str, token: Option<String>, dimension: usize) -> Self {
        Self::with_url(format!("{HF_PIPELINE_URL}/{model}"), token, dimension)
    }

    pub fn with_url(url: impl Into<String>, token: Option<String>, dimension: usize) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            token,
            dimension,
        }
    }
}

#[derive(Serialize)]
struct HfRequest<'a> {
    inputs: &'a [String],
    options: HfOptions,
}

#[derive(Serialize)]
struct HfOptions {
    wait_for_model: bool,
}

#[async_trait]
impl EmbeddingBackend for HuggingFaceEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.http.post(&self.url).json(&HfRequest {
            inputs: texts,
            options: HfOptions {
                wait_for_model: true,
            },
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("HF request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("HF API error {}: {}", status, body)));
        }

        response
            .json::<Vec<Vec<f32>>>()
            .await
            .map_err(|e| Error::Embedding(format!("invalid HF response: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

/// OpenAI embeddings.
pub struct OpenAiEmbeddings {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: &str, model: impl Into<String>, api_base: Option<&str>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("OPENAI_API_KEY not set".to_string()));
        }

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Ok(Self {
            client: OpenAIClient::with_config(config),
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        debug!(
            "Generated {} embeddings, tokens used: {}",
            response.data.len(),
            response.usage.total_tokens
        );

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic, fast embedding for offline/local use.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            vec[idx] += 1.0;
        }

        normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl EmbeddingBackend for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Vectors for a batch, and whether they are random substitutes.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    pub vectors: Vec<Vec<f32>>,
    pub degraded: bool,
}

/// Embedding adapter that never fails.
///
/// Provider errors, timeouts and malformed responses are replaced by
/// uniformly random vectors of the backend's dimension. Such results are
/// flagged `degraded` and must be treated as low confidence.
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    timeout: Duration,
    fallbacks: Arc<AtomicU64>,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            fallbacks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build the configured backend.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let backend: Arc<dyn EmbeddingBackend> = match config.provider {
            EmbeddingProviderKind::HuggingFace => {
                if config.token.is_none() {
                    warn!("HUGGINGFACE_TOKEN not set, using anonymous HF access");
                }
                match &config.url {
                    Some(url) => Arc::new(HuggingFaceEmbeddings::with_url(
                        url.clone(),
                        config.token.clone(),
                        config.dimension,
                    )),
                    None => Arc::new(HuggingFaceEmbeddings::new(
                        &config.model,
                        config.token.clone(),
                        config.dimension,
                    )),
                }
            }
            EmbeddingProviderKind::OpenAi => Arc::new(OpenAiEmbeddings::new(
                config.token.as_deref().unwrap_or_default(),
                config.model.clone(),
                config.url.as_deref(),
            )?),
            EmbeddingProviderKind::Local => Arc::new(LocalEmbedder::new(config.dimension)),
        };

        info!(provider = backend.name(), dimension = backend.dimension(), "Embedding provider ready");
        Ok(Self::new(backend, Duration::from_secs(config.timeout_secs)))
    }

    pub fn local(dim: usize) -> Self {
        Self::new(Arc::new(LocalEmbedder::new(dim)), Duration::from_secs(30))
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn provider(&self) -> &'static str {
        self.backend.name()
    }

    /// Number of batches answered with fallback vectors so far.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub async fn embed_batch(&self, texts: &[String]) -> EmbeddingBatch {
        if texts.is_empty() {
            return EmbeddingBatch {
                vectors: Vec::new(),
                degraded: false,
            };
        }

        let reason = match tokio::time::timeout(self.timeout, self.backend.embed_batch(texts)).await
        {
            Ok(Ok(vectors)) if vectors.len() == texts.len() => {
                return EmbeddingBatch {
                    vectors,
                    degraded: false,
                };
            }
            Ok(Ok(vectors)) => format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            ),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {:?}", self.timeout),
        };

        warn!(
            provider = self.backend.name(),
            "Embedding error, using random fallback vectors: {}", reason
        );
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        metrics::record_embedding_fallback(self.backend.name());

        EmbeddingBatch {
            vectors: random_vectors(texts.len(), self.backend.dimension()),
            degraded: true,
        }
    }

    pub async fn embed(&self, text: &str) -> (Vec<f32>, bool) {
        let batch = self.embed_batch(&[text.to_string()]).await;
        let degraded = batch.degraded;
        let vector = batch
            .vectors
            .into_iter()
            .next()
            .unwrap_or_else(|| vec![0.0; self.dimension()]);
        (vector, degraded)
    }
}

fn random_vectors(count: usize, dim: usize) -> Vec<Vec<f32>> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect())
        .collect()
}

pub(crate) fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    struct Failing;

    #[async_trait]
    impl EmbeddingBackend for Failing {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Embedding("service unavailable".to_string()))
        }

        fn dimension(&self) -> usize {
            384
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Slow;

    #[async_trait]
    impl EmbeddingBackend for Slow {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![vec![1.0; 4]; texts.len()])
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn failing_provider_degrades_to_random_vectors() {
        let embedder = Embedder::new(Arc::new(Failing), Duration::from_secs(1));

        let batch = embedder.embed_batch(&texts(&["Theft", "Murder"])).await;

        assert!(batch.degraded);
        assert_eq!(batch.vectors.len(), 2);
        assert!(batch.vectors.iter().all(|v| v.len() == 384));
        assert!(batch
            .vectors
            .iter()
            .flatten()
            .all(|x| (0.0..1.0).contains(x)));
        assert_eq!(embedder.fallback_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_degrades_to_random_vectors() {
        let embedder = Embedder::new(Arc::new(Slow), Duration::from_secs(30));

        let (vector, degraded) = embedder.embed("query").await;

        assert!(degraded);
        assert_eq!(vector.len(), 4);
    }

    #[tokio::test]
    async fn local_backend_is_never_degraded() {
        let embedder = Embedder::local(32);
        let batch = embedder.embed_batch(&texts(&["Theft", "Cheating"])).await;

        assert!(!batch.degraded);
        assert_eq!(batch.vectors.len(), 2);
        assert_eq!(embedder.fallback_count(), 0);
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let embedder = Embedder::new(Arc::new(Failing), Duration::from_secs(1));
        let batch = embedder.embed_batch(&[]).await;

        assert!(batch.vectors.is_empty());
        assert!(!batch.degraded);
        assert_eq!(embedder.fallback_count(), 0);
    }

    #[tokio::test]
    async fn huggingface_posts_inputs_and_parses_matrix() {
        let server = MockServer::start_async().await;

        let hf_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/minilm")
                .header("Authorization", "Bearer hf_test")
                .json_body(json!({
                    "inputs": ["Theft", "Murder"],
                    "options": { "wait_for_model": true }
                }));
            then.status(200)
                .json_body(json!([[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]));
        });

        let backend = HuggingFaceEmbeddings::with_url(
            server.url("/models/minilm"),
            Some("hf_test".to_string()),
            3,
        );

        let vectors = backend
            .embed_batch(&texts(&["Theft", "Murder"]))
            .await
            .unwrap();

        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][2] - 0.6).abs() < 1e-6);
        hf_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn huggingface_http_error_falls_back_in_embedder() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/models/minilm");
            then.status(503).body("model loading");
        });

        let backend = HuggingFaceEmbeddings::with_url(server.url("/models/minilm"), None, 384);
        let err = backend.embed_batch(&texts(&["Theft"])).await.unwrap_err();
        assert!(err.to_string().contains("HF API error 503"));

        let embedder = Embedder::new(Arc::new(backend), Duration::from_secs(5));
        let batch = embedder.embed_batch(&texts(&["Theft"])).await;
        assert!(batch.degraded);
        assert_eq!(batch.vectors[0].len(), 384);
    }

    #[tokio::test]
    async fn short_response_is_treated_as_failure() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/models/minilm");
            then.status(200).json_body(json!([[0.1, 0.2]]));
        });

        let backend = HuggingFaceEmbeddings::with_url(server.url("/models/minilm"), None, 2);
        let embedder = Embedder::new(Arc::new(backend), Duration::from_secs(5));

        let batch = embedder.embed_batch(&texts(&["a", "b"])).await;
        assert!(batch.degraded);
        assert_eq!(batch.vectors.len(), 2);
    }

    #[test]
    fn openai_backend_requires_key() {
        assert!(OpenAiEmbeddings::new("  ", "text-embedding-3-small", None).is_err());

        let backend = OpenAiEmbeddings::new("sk-test", "text-embedding-3-large", None).unwrap();
        assert_eq!(backend.dimension(), 3072);
    }

    #[test]
    fn local_embedder_produces_consistent_embeddings() {
        let embedder = LocalEmbedder::new(64);
        let text = "theft of movable property";

        let emb1 = embedder.embed(text);
        let emb2 = embedder.embed(text);

        assert_eq!(emb1, emb2);
        assert_eq!(emb1.len(), 64);
    }

    #[test]
    fn local_embedder_ignores_case_and_punctuation() {
        let embedder = LocalEmbedder::new(64);
        assert_eq!(embedder.embed("Theft!"), embedder.embed("theft"));
    }

    #[test]
    fn local_embedder_respects_minimum_dimension() {
        let embedder = LocalEmbedder::new(0);
        assert_eq!(EmbeddingBackend::dimension(&embedder), 8);
    }

    #[test]
    fn local_embedder_empty_text() {
        let embedder = LocalEmbedder::new(32);
        let emb = embedder.embed("");

        assert_eq!(emb.len(), 32);
        assert!(emb.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn normalize_scales_vector_to_unit_length() {
        let mut vec = vec![3.0, 4.0];
        normalize(&mut vec);
        let norm = (vec[0].powi(2) + vec[1].powi(2)).sqrt();

        assert!((norm - 1.0).abs() < 1e-6);
        assert!(vec[1] > vec[0]);
    }
}
