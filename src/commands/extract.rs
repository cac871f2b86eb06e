//! `extract`: statute text files -> offense tuple file.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::retry_policy;
use crate::config::Config;
use crate::graphrag::{tuple_file, Chunker, OffenseExtractor};
use crate::integrations::chat_model_from_config;

#[derive(Debug, Clone)]
pub struct ExtractArgs {
    /// UTF-8 text files with statute text
    pub inputs: Vec<PathBuf>,
    /// Tuple file to write
    pub output: PathBuf,
    /// Overrides `extraction.batch_size`
    pub batch_size: Option<usize>,
    /// Keep tuples already present in `output`
    pub merge: bool,
}

pub async fn run(args: ExtractArgs) -> Result<()> {
    let config = Config::new();
    config.validate_llm()?;

    let chunker = Chunker::new(
        config.extraction.chunk_size,
        config.extraction.chunk_overlap,
    );

    let mut chunks = Vec::new();
    for input in &args.inputs {
        let file_chunks = chunker
            .chunk_file(input)
            .with_context(|| format!("failed to read {}", input.display()))?;
        info!("{}: {} chunks", input.display(), file_chunks.len());
        chunks.extend(file_chunks.into_iter().map(|c| c.text));
    }

    if chunks.is_empty() {
        bail!("no text found in the input files");
    }

    let model = chat_model_from_config(&config.llm)?;
    let extractor = OffenseExtractor::new(model, retry_policy(&config.extraction));
    let batch_size = args.batch_size.unwrap_or(config.extraction.batch_size);

    let extracted = extractor.extract(&chunks, batch_size).await;
    if extracted.is_empty() {
        warn!("No tuples extracted");
    }

    let mut tuples = if args.merge {
        tuple_file::load(&args.output)
    } else {
        BTreeSet::new()
    };
    let before = tuples.len();
    tuples.extend(extracted);

    tuple_file::save(&args.output, &tuples)?;
    println!(
        "Extracted {} new tuples ({} total) -> {}",
        tuples.len() - before,
        tuples.len(),
        args.output.display()
    );
    Ok(())
}
