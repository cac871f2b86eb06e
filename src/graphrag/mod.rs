//! Graph RAG over the BNS offense graph.
//!
//! Two flows share this module:
//! - ingestion: raw statute text is chunked, sent to the language model in
//!   batches, and the returned `(offense, chapter, section, punishment)`
//!   tuples are parsed, deduplicated and written to the graph
//! - querying: a question is matched to the closest node name by embedding
//!   similarity, the node's neighbourhood becomes the context, and the
//!   language model turns it into an answer delivered as a stream of
//!   progress events

pub mod chunker;
pub mod context;
pub mod events;
pub mod extractor;
pub mod interpreter;
pub mod parser;
pub mod pipeline;
pub mod retriever;
pub mod thinking;
pub mod tuple_file;

pub use chunker::{Chunk, Chunker};
pub use context::ContextAssembler;
pub use events::{AnalyzeData, AnalyzeResponse, Stage, StreamEvent};
pub use extractor::OffenseExtractor;
pub use interpreter::{Interpretation, LegalInterpreter};
pub use parser::{parse_tuples, CandidateError, ParseReport, RecordError};
pub use pipeline::{HealthReport, LegalAssistant};
pub use retriever::{cosine_similarity, NodeEmbeddingIndex, NodeMatch, SimilarityRetriever};
pub use thinking::split_think_sections;
