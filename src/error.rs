//! Error types for the RAG core

use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG core errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Embedding returned a vector or batch of the wrong shape.
    ///
    /// Carries the offending input's size and a bounded preview only, never
    /// the full content.
    #[error("Embedding shape mismatch: expected {expected}, got {actual} (input {input_len} chars: {input_preview:?})")]
    EmbeddingShape {
        expected: usize,
        actual: usize,
        input_len: usize,
        input_preview: String,
    },

    /// Vector store error
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Document store error
    #[error("Document store error: {0}")]
    DocumentStore(String),

    /// Chat/completion provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Web search provider error
    #[error("Web search error: {0}")]
    WebSearch(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Provider call exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an embedding shape error with a bounded input preview
    pub fn embedding_shape(expected: usize, actual: usize, input: &str) -> Self {
        Self::EmbeddingShape {
            expected,
            actual,
            input_len: input.chars().count(),
            input_preview: input.chars().take(48).collect(),
        }
    }

    /// Create a vector store error
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStore(message.into())
    }

    /// Create a document store error
    pub fn document_store(message: impl Into<String>) -> Self {
        Self::DocumentStore(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap an error with the operation name and document id for observability
    pub fn in_operation(self, operation: &str, document_id: uuid::Uuid) -> Self {
        Self::Internal(format!("{} for document {}: {}", operation, document_id, self))
    }
}
