//! Legal graph storage and embedding module
//!
//! Provides tools for:
//! - Writing offense tuples to a property graph (Neo4j or in-memory)
//! - Fetching node names and multi-hop neighbourhoods
//! - Turning text into vectors, with a random fallback on provider failure

pub mod embeddings;
pub mod graph_db;
pub mod memory_graph;
pub mod models;

pub use embeddings::{Embedder, EmbeddingBackend, EmbeddingBatch, LocalEmbedder};
pub use graph_db::{create_knowledge_graph, GraphStore, IngestReport, Neo4jStore};
pub use memory_graph::MemoryGraph;
pub use models::{HopRange, NodeScope, OffenseTuple, RelatedInfo};
