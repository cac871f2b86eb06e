//! System prompt loader.
//!
//! Prompts live in the `prompts/` directory at the project root. A built-in
//! copy is compiled in so the pipeline still works when the directory is
//! missing.

use std::path::PathBuf;

use tracing::debug;

use crate::{Error, Result};

/// Version tag of the extraction output schema.
pub const EXTRACTION_SCHEMA: &str = "offense-tuples/v1";

const OFFENSE_EXTRACTION: &str = include_str!("../prompts/offense_extraction.md");
const LEGAL_INTERPRETATION: &str = include_str!("../prompts/legal_interpretation.md");

/// Available prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Few-shot extraction of offense tuples from statute text.
    OffenseExtraction,
    /// BNS legal interpretation of retrieved context.
    LegalInterpretation,
}

impl Prompt {
    /// Prompt file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::OffenseExtraction => "offense_extraction.md",
            Prompt::LegalInterpretation => "legal_interpretation.md",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            Prompt::OffenseExtraction => OFFENSE_EXTRACTION,
            Prompt::LegalInterpretation => LEGAL_INTERPRETATION,
        }
    }

    /// Load prompt from file.
    pub fn load(&self) -> Result<String> {
        load_prompt(self.filename())
    }

    /// Load from `prompts/` if present, otherwise the built-in text.
    pub fn load_or_builtin(&self) -> String {
        match self.load() {
            Ok(text) => text,
            Err(err) => {
                debug!("Using built-in prompt {}: {}", self.filename(), err);
                self.builtin().to_string()
            }
        }
    }
}

/// Load a prompt by file name.
pub fn load_prompt(filename: &str) -> Result<String> {
    let path = prompts_dir().join(filename);
    std::fs::read_to_string(&path).map_err(|e| {
        Error::InvalidArgument(format!("Failed to load prompt {}: {}", filename, e))
    })
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}

/// Substitute `{name}` placeholders.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// All available prompts.
pub fn list_prompts() -> Vec<Prompt> {
    vec![Prompt::OffenseExtraction, Prompt::LegalInterpretation]
}
