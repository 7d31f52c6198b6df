//! grounded-rag: retrieval-augmented generation core for document-grounded
//! assistants
//!
//! This crate implements the retrieval pipeline that keeps an assistant's
//! answers grounded in a user's own documents: incremental re-embedding driven
//! by content-change detection, adaptive chunking, query preprocessing and
//! intent classification, hybrid semantic+keyword retrieval with multi-query
//! re-ranking, token-budgeted context selection, and an orchestrator that
//! decides between document retrieval and live web search before generation.
//!
//! Embedding, chat, vector storage, relational storage, and web search are
//! external collaborators behind the traits in [`providers`].

pub mod cancel;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod metrics;
pub mod orchestrator;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod types;

pub use cancel::CancelToken;
pub use config::RagConfig;
pub use error::{Error, Result};
pub use metrics::PipelineMetrics;
pub use orchestrator::QueryOrchestrator;
pub use processing::IncrementalVectorizer;
pub use types::{
    Citation, QueryIntent, QueryOutcome, QueryRequest, RagAnswer, SearchResult, VectorizeReport,
};
