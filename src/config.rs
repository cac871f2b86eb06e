//! Configuration for the graph store, language model and embedding providers
//!
//! Loads configuration from config.yml; environment variables take precedence.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::analysis::models::{HopRange, NodeScope};
use crate::{Error, Result};

pub const DEFAULT_DATABASE: &str = "neo4j";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Chat model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat completions endpoint (Groq, OpenAI)
    OpenAi,
    /// Local Ollama server
    Ollama,
}

impl LlmProvider {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" | "groq" => Some(Self::OpenAi),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Hugging Face feature-extraction inference API
    HuggingFace,
    /// OpenAI embeddings API
    OpenAi,
    /// Deterministic in-process hashing embedder
    Local,
}

impl EmbeddingProviderKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Some(Self::HuggingFace),
            "openai" => Some(Self::OpenAi),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    neo4j: Option<YamlNeo4j>,
    llm: Option<YamlLlm>,
    embeddings: Option<YamlEmbeddings>,
    extraction: Option<YamlExtraction>,
    retrieval: Option<YamlRetrieval>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlNeo4j {
    uri: Option<String>,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlLlm {
    provider: Option<LlmProvider>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlEmbeddings {
    provider: Option<EmbeddingProviderKind>,
    model: Option<String>,
    url: Option<String>,
    token: Option<String>,
    dimension: Option<usize>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlExtraction {
    batch_size: Option<usize>,
    max_attempts: Option<u32>,
    backoff_ms: Option<u64>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlRetrieval {
    scope: Option<NodeScope>,
    min_hops: Option<u32>,
    max_hops: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    /// Overrides the provider's default endpoint
    pub url: Option<String>,
    pub token: Option<String>,
    pub dimension: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    /// Words per chunk when splitting raw source text
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub scope: NodeScope,
    pub hops: HopRange,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j: Neo4jConfig,
    pub llm: LlmConfig,
    pub embeddings: EmbeddingConfig,
    pub extraction: ExtractionConfig,
    pub retrieval: RetrievalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults.
    /// Environment variables take precedence over config.yml values.
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::from_yaml(YamlConfig::default()))
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text (env vars still apply)
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let yaml: YamlConfig = serde_yaml::from_str(content)?;
        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let neo4j = yaml.neo4j.unwrap_or_default();
        let llm = yaml.llm.unwrap_or_default();
        let embeddings = yaml.embeddings.unwrap_or_default();
        let extraction = yaml.extraction.unwrap_or_default();
        let retrieval = yaml.retrieval.unwrap_or_default();

        let llm_provider = std::env::var("LLM_PROVIDER")
            .ok()
            .and_then(|v| LlmProvider::parse(&v))
            .or(llm.provider)
            .unwrap_or(LlmProvider::OpenAi);

        let default_base_url = match llm_provider {
            LlmProvider::OpenAi => DEFAULT_LLM_BASE_URL,
            LlmProvider::Ollama => DEFAULT_OLLAMA_URL,
        };

        let mut api_key = resolve_env_string(llm.api_key, "LLM_API_KEY");
        if api_key.is_empty() {
            api_key = std::env::var("GROQ_API_KEY").unwrap_or_default();
        }

        let embedding_provider = std::env::var("EMBEDDING_PROVIDER")
            .ok()
            .and_then(|v| EmbeddingProviderKind::parse(&v))
            .or(embeddings.provider)
            .unwrap_or(EmbeddingProviderKind::HuggingFace);

        let token_env = match embedding_provider {
            EmbeddingProviderKind::OpenAi => "OPENAI_API_KEY",
            _ => "HUGGINGFACE_TOKEN",
        };
        let token = Some(resolve_env_string(embeddings.token, token_env)).filter(|t| !t.is_empty());

        Self {
            neo4j: Neo4jConfig {
                uri: resolve_env_string(neo4j.uri, "NEO4J_URI"),
                username: resolve_env_string(neo4j.username, "NEO4J_USERNAME"),
                password: resolve_env_string(neo4j.password, "NEO4J_PASSWORD"),
                database: Some(resolve_env_string(neo4j.database, "NEO4J_DATABASE"))
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            },
            llm: LlmConfig {
                provider: llm_provider,
                base_url: Some(resolve_env_string(llm.base_url, "LLM_BASE_URL"))
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| default_base_url.to_string()),
                api_key,
                model: Some(resolve_env_string(llm.model, "LLM_MODEL"))
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                temperature: llm.temperature.unwrap_or(0.3),
                max_tokens: llm.max_tokens.unwrap_or(2048),
            },
            embeddings: EmbeddingConfig {
                provider: embedding_provider,
                model: embeddings
                    .model
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                url: embeddings.url,
                token,
                dimension: embeddings.dimension.unwrap_or(DEFAULT_EMBEDDING_DIM),
                timeout_secs: embeddings.timeout_secs.unwrap_or(30),
            },
            extraction: ExtractionConfig {
                batch_size: extraction.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
                max_attempts: extraction.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1),
                backoff_ms: extraction.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS),
                chunk_size: extraction.chunk_size.unwrap_or(200),
                chunk_overlap: extraction.chunk_overlap.unwrap_or(20),
            },
            retrieval: RetrievalConfig {
                scope: retrieval.scope.unwrap_or_default(),
                hops: HopRange::new(
                    retrieval.min_hops.unwrap_or(1),
                    retrieval.max_hops.unwrap_or(2),
                ),
            },
        }
    }

    /// Fail fast on missing graph credentials.
    pub fn validate_graph(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("NEO4J_URI", &self.neo4j.uri),
            ("NEO4J_USERNAME", &self.neo4j.username),
            ("NEO4J_PASSWORD", &self.neo4j.password),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Neo4j credentials not found: {}",
                missing.join(", ")
            )))
        }
    }

    /// Fail fast on a missing language model key.
    pub fn validate_llm(&self) -> Result<()> {
        if self.llm.provider == LlmProvider::OpenAi && self.llm.api_key.trim().is_empty() {
            return Err(Error::Config(
                "LLM_API_KEY (or GROQ_API_KEY) not found in environment".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve a value: prefer env var if config value looks like ${VAR}
fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
    if let Some(ref v) = value {
        if v.starts_with("${") && v.ends_with('}') {
            let var_name = &v[2..v.len() - 1];
            if let Ok(env_val) = std::env::var(var_name) {
                return env_val;
            }
            return String::new();
        }
    }
    if let Ok(env_val) = std::env::var(env_key) {
        return env_val;
    }
    value.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    struct EnvGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }

        fn unset(key: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::remove_var(key);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }

    fn clear_envs() -> Vec<EnvGuard> {
        [
            "NEO4J_URI",
            "NEO4J_USERNAME",
            "NEO4J_PASSWORD",
            "NEO4J_DATABASE",
            "LLM_PROVIDER",
            "LLM_API_KEY",
            "GROQ_API_KEY",
            "LLM_BASE_URL",
            "LLM_MODEL",
            "EMBEDDING_PROVIDER",
            "HUGGINGFACE_TOKEN",
            "OPENAI_API_KEY",
        ]
        .iter()
        .map(|k| EnvGuard::unset(k))
        .collect()
    }

    #[test]
    fn defaults_without_yaml() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_envs();

        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config.neo4j.database, DEFAULT_DATABASE);
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert!((config.llm.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.embeddings.provider, EmbeddingProviderKind::HuggingFace);
        assert_eq!(config.embeddings.dimension, 384);
        assert_eq!(config.embeddings.timeout_secs, 30);
        assert_eq!(config.extraction.batch_size, 10);
        assert_eq!(config.extraction.max_attempts, 3);
        assert_eq!(config.extraction.backoff_ms, 1000);
        assert_eq!(config.retrieval.scope, NodeScope::Offenses);
        assert_eq!(config.retrieval.hops, HopRange::new(1, 2));
    }

    #[test]
    fn missing_credentials_are_config_errors() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_envs();

        let config = Config::from_yaml_str("{}").unwrap();
        let err = config.validate_graph().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("NEO4J_PASSWORD"));

        let err = config.validate_llm().unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn env_overrides_yaml_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        let mut guards = clear_envs();
        guards.push(EnvGuard::set("NEO4J_URI", "bolt://env:7687"));
        guards.push(EnvGuard::set("GROQ_API_KEY", "gsk_env"));

        let yaml = r#"
neo4j:
  uri: "bolt://yaml:7687"
  username: neo4j
  password: secret
llm:
  model: "llama-3.1-8b-instant"
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.neo4j.uri, "bolt://env:7687");
        assert_eq!(config.neo4j.username, "neo4j");
        assert_eq!(config.llm.api_key, "gsk_env");
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
        assert!(config.validate_graph().is_ok());
        assert!(config.validate_llm().is_ok());
    }

    #[test]
    fn yaml_placeholder_reads_named_env_var() {
        let _lock = ENV_LOCK.lock().unwrap();
        let mut guards = clear_envs();
        guards.push(EnvGuard::set("MY_NEO4J_SECRET", "from-placeholder"));

        let yaml = r#"
neo4j:
  password: "${MY_NEO4J_SECRET}"
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.neo4j.password, "from-placeholder");
    }

    #[test]
    fn ollama_provider_needs_no_key() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_envs();

        let yaml = r#"
llm:
  provider: ollama
  model: "qwen3:8b"
embeddings:
  provider: local
  dimension: 64
retrieval:
  scope: all_named
  max_hops: 3
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.base_url, DEFAULT_OLLAMA_URL);
        assert!(config.validate_llm().is_ok());
        assert_eq!(config.embeddings.provider, EmbeddingProviderKind::Local);
        assert_eq!(config.embeddings.dimension, 64);
        assert_eq!(config.retrieval.scope, NodeScope::AllNamed);
        assert_eq!(config.retrieval.hops.max, 3);
    }

    #[test]
    fn batch_size_is_at_least_one() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guards = clear_envs();

        let config = Config::from_yaml_str("extraction:\n  batch_size: 0\n").unwrap();
        assert_eq!(config.extraction.batch_size, 1);
    }

    #[test]
    fn invalid_yaml_is_reported() {
        assert!(matches!(
            Config::from_yaml_str("neo4j: ["),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!(LlmProvider::parse("Groq"), Some(LlmProvider::OpenAi));
        assert_eq!(LlmProvider::parse("OLLAMA"), Some(LlmProvider::Ollama));
        assert_eq!(LlmProvider::parse("other"), None);
        assert_eq!(
            EmbeddingProviderKind::parse("hf"),
            Some(EmbeddingProviderKind::HuggingFace)
        );
    }
}
