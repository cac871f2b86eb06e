//! `ingest`: offense tuple file -> Neo4j.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::analysis::{create_knowledge_graph, GraphStore, Neo4jStore};
use crate::config::Config;
use crate::graphrag::tuple_file;

pub async fn run(file: &Path, init_schema: bool) -> Result<()> {
    let config = Config::new();
    config.validate_graph()?;

    let tuples: Vec<_> = tuple_file::load(file).into_iter().collect();
    if tuples.is_empty() {
        warn!("Nothing to ingest from {}", file.display());
        println!("No tuples found in {}", file.display());
        return Ok(());
    }

    let store = Neo4jStore::connect(&config.neo4j)
        .await
        .context("failed to connect to Neo4j")?;
    if init_schema {
        store.init_schema().await?;
    }

    let report = create_knowledge_graph(&store, &tuples).await;
    let offenses = store.count_offenses().await?;

    println!(
        "Ingested {} tuples ({} failed); graph now has {} offenses",
        report.written, report.failed, offenses
    );
    Ok(())
}
