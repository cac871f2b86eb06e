use std::path::Path;

use uuid::Uuid;

use crate::Result;

/// Fragment of statute text handed to the extractor.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Unique chunk id
    pub id: Uuid,
    /// Raw text of the chunk
    pub text: String,
    /// Word index of the first token (for reference)
    pub start: usize,
    /// Word index after the last token (for reference)
    pub end: usize,
    /// Source document label
    pub source: String,
}

impl Chunk {
    pub fn new(text: String, start: usize, end: usize, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            start,
            end,
            source: source.into(),
        }
    }
}

/// Word-window chunker with overlap.
#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Self {
        Self {
            size: size.max(1),
            overlap: overlap.min(size.saturating_sub(1)),
        }
    }

    /// Split text into overlapping chunks.
    pub fn chunk(&self, text: &str, source: impl Into<String>) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let step = self.size.saturating_sub(self.overlap).max(1);
        let mut chunks = Vec::new();
        let mut idx = 0;
        let source = source.into();

        while idx < words.len() {
            let end = (idx + self.size).min(words.len());
            let chunk_text = words[idx..end].join(" ");
            chunks.push(Chunk::new(chunk_text, idx, end, source.clone()));

            if end == words.len() {
                break;
            }
            idx += step;
        }

        chunks
    }

    /// Read a UTF-8 text file and chunk it, labelled by file name.
    pub fn chunk_file(&self, path: &Path) -> Result<Vec<Chunk>> {
        let text = std::fs::read_to_string(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.chunk(&text, source))
    }
}
