//! Legal graph RAG CLI - main entry point
//!
//! Extracts offense tuples from statute text, loads them into Neo4j and
//! answers legal questions against the resulting graph.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use legal_graph_rag::{commands, metrics};
use tracing::warn;

#[derive(Parser)]
#[command(name = "legal_graph_rag")]
#[command(about = "Legal knowledge-graph retrieval and answering (BNS)", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract offense tuples from statute text files
    Extract {
        /// UTF-8 text files to process
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output tuple file (JSON)
        #[arg(short, long, default_value = "data/offense_tuples.json")]
        output: PathBuf,

        /// Chunks per language model call
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Keep tuples already in the output file
        #[arg(long, default_value_t = false)]
        merge: bool,
    },

    /// Write a tuple file to Neo4j
    Ingest {
        /// Tuple file (JSON list of 4-string arrays)
        #[arg(default_value = "data/offense_tuples.json")]
        file: PathBuf,

        /// Create uniqueness constraints first
        #[arg(long, default_value_t = false)]
        init_schema: bool,
    },

    /// Answer a question, streaming progress frames
    Ask {
        query: String,

        /// Use an in-memory graph loaded from this tuple file instead of Neo4j
        #[arg(long)]
        offline: Option<PathBuf>,
    },

    /// Answer a question, printing one JSON result
    Analyze {
        query: String,

        /// Use an in-memory graph loaded from this tuple file instead of Neo4j
        #[arg(long)]
        offline: Option<PathBuf>,
    },

    /// Check graph and model readiness
    Health {
        /// Use an in-memory graph loaded from this tuple file instead of Neo4j
        #[arg(long)]
        offline: Option<PathBuf>,

        /// Build the embedding index before reporting
        #[arg(long, default_value_t = false)]
        warm: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Extract { .. } => "extract",
            Commands::Ingest { .. } => "ingest",
            Commands::Ask { .. } => "ask",
            Commands::Analyze { .. } => "analyze",
            Commands::Health { .. } => "health",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("legal_graph_rag=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Extract {
            inputs,
            output,
            batch_size,
            merge,
        } => {
            commands::extract::run(commands::ExtractArgs {
                inputs,
                output,
                batch_size,
                merge,
            })
            .await?;
        }
        Commands::Ingest { file, init_schema } => {
            commands::ingest::run(&file, init_schema).await?;
        }
        Commands::Ask { query, offline } => {
            commands::query::ask(&query, offline.as_deref()).await?;
        }
        Commands::Analyze { query, offline } => {
            commands::query::analyze(&query, offline.as_deref()).await?;
        }
        Commands::Health { offline, warm } => {
            commands::query::health(offline.as_deref(), warm).await?;
        }
    }

    Ok(())
}
