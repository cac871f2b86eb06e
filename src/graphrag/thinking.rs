//! Reasoning-block removal for model answers.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid think pattern"));

/// Model answer split into reasoning and visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingResponse {
    /// Concatenated content of every `<think>...</think>` block.
    pub thinking: Option<String>,
    /// Answer with the blocks removed, trimmed.
    pub answer: String,
}

/// Remove paired `<think>` blocks; an unclosed tag is left in place.
pub fn split_think_sections(response: &str) -> ThinkingResponse {
    let blocks: Vec<&str> = THINK_BLOCK
        .captures_iter(response)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect();

    let answer = THINK_BLOCK.replace_all(response, "").trim().to_string();

    ThinkingResponse {
        thinking: (!blocks.is_empty()).then(|| blocks.join("\n\n")),
        answer,
    }
}
