//! Legal Knowledge-Graph RAG Library
//!
//! This library provides tools to:
//! - Extract `(offense, chapter, section, punishment)` tuples from statute
//!   text with a language model
//! - Store them as a property graph in Neo4j (or in memory)
//! - Match questions to graph nodes by embedding similarity
//! - Assemble multi-hop graph context and stream a legal interpretation

pub mod analysis;
pub mod config;
pub mod error;
pub mod graphrag;
pub mod integrations;
pub mod metrics;
pub mod prompts;

// Re-export common types
pub use analysis::{Embedder, GraphStore, MemoryGraph, Neo4jStore, OffenseTuple};
pub use config::Config;
pub use error::{Error, Result};
pub use graphrag::{LegalAssistant, OffenseExtractor, StreamEvent};
pub use integrations::{ChatMessage, ChatModel, OllamaClient, OpenAIClient};
pub use prompts::{load_prompt, Prompt};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
