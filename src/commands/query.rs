//! `ask`, `analyze` and `health`.

use std::io::Write;
use std::path::Path;
use std::pin::pin;

use anyhow::{bail, Result};
use futures::StreamExt;
use tracing::{info, warn};

use super::{open_graph, retry_policy};
use crate::analysis::Embedder;
use crate::config::Config;
use crate::graphrag::{AnalyzeResponse, HealthReport, LegalAssistant};
use crate::integrations::chat_model_from_config;

async fn build_assistant(config: &Config, offline: Option<&Path>) -> Result<LegalAssistant> {
    config.validate_llm()?;
    let graph = open_graph(config, offline).await?;
    let embedder = Embedder::from_config(&config.embeddings)?;
    let model = chat_model_from_config(&config.llm)?;

    Ok(LegalAssistant::new(
        graph,
        embedder,
        model,
        &config.retrieval,
        retry_policy(&config.extraction),
    ))
}

/// Stream answer frames (`data: <json>\n\n`) to stdout.
pub async fn ask(query: &str, offline: Option<&Path>) -> Result<()> {
    let config = Config::new();
    let assistant = build_assistant(&config, offline).await?;

    let mut events = pin!(assistant.analyze_stream(query)?);
    let mut stdout = std::io::stdout();
    let mut failed = false;

    while let Some(event) = events.next().await {
        failed |= event.kind() == "error";
        stdout.write_all(event.to_frame().as_bytes())?;
        stdout.flush()?;
    }

    if failed {
        bail!("query failed");
    }
    Ok(())
}

/// Print one JSON response object.
pub async fn analyze(query: &str, offline: Option<&Path>) -> Result<()> {
    let config = Config::new();
    let assistant = build_assistant(&config, offline).await?;

    let response = assistant.analyze(query).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if let AnalyzeResponse::Error { error, .. } = response {
        bail!(error);
    }
    Ok(())
}

/// Print the health report; optionally build the index first.
pub async fn health(offline: Option<&Path>, warm: bool) -> Result<()> {
    let config = Config::new();

    let report = match build_assistant(&config, offline).await {
        Ok(assistant) => {
            if warm {
                match assistant.retriever().warm().await {
                    Ok(nodes) => info!("Index warmed: {} nodes", nodes),
                    Err(err) => warn!("Index warm-up failed: {}", err),
                }
            }
            assistant.health().await
        }
        Err(err) => {
            warn!("Pipeline unavailable: {:#}", err);
            HealthReport {
                status: "unavailable",
                graph_connected: false,
                llm_ready: config.validate_llm().is_ok(),
                index_built: false,
                indexed_nodes: 0,
                offense_count: None,
                model: config.llm.model.clone(),
                embedding_provider: "none",
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
