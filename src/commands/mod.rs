//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod extract;
pub mod ingest;
pub mod query;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::analysis::{create_knowledge_graph, GraphStore, MemoryGraph, Neo4jStore};
use crate::config::{Config, ExtractionConfig};
use crate::graphrag::tuple_file;
use crate::integrations::RetryPolicy;

pub use extract::{run as extract_run, ExtractArgs};
pub use ingest::run as ingest_run;
pub use query::{analyze as analyze_run, ask as ask_run, health as health_run};

/// Retry policy for language model calls.
pub fn retry_policy(extraction: &ExtractionConfig) -> RetryPolicy {
    RetryPolicy::new(
        extraction.max_attempts,
        Duration::from_millis(extraction.backoff_ms),
    )
}

/// Neo4j from config, or an in-memory graph loaded from a tuple file.
pub async fn open_graph(config: &Config, offline: Option<&Path>) -> Result<Arc<dyn GraphStore>> {
    match offline {
        Some(path) => {
            let graph = MemoryGraph::new();
            let tuples: Vec<_> = tuple_file::load(path).into_iter().collect();
            let report = create_knowledge_graph(&graph, &tuples).await;
            info!(
                "Offline graph from {}: {} offenses written",
                path.display(),
                report.written
            );
            Ok(Arc::new(graph))
        }
        None => {
            config.validate_graph()?;
            let store = Neo4jStore::connect(&config.neo4j)
                .await
                .context("failed to connect to Neo4j")?;
            Ok(Arc::new(store))
        }
    }
}
