//! Configuration for the RAG core

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main RAG core configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    /// Embedding configuration
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Context selection configuration
    #[serde(default)]
    pub context: ContextConfig,
    /// Web search configuration
    #[serde(default)]
    pub web: WebSearchConfig,
    /// Vectorization processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions for the configured model
    pub dimensions: usize,
    /// Known legacy dimensions left behind by previous models.
    ///
    /// Stored vectors at one of these dimensions are zero-padded up to
    /// `dimensions` during scoring; anything else is excluded.
    #[serde(default)]
    pub legacy_dimensions: Vec<usize>,
    /// Batch size for embedding generation
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            legacy_dimensions: vec![384],
            batch_size: 32,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
    /// Minimum chunk size (skip smaller chunks)
    pub min_chunk_size: usize,
    /// Hard maximum chunk size
    pub max_chunk_size: usize,
    /// Target size when tables or code are detected
    pub dense_chunk_size: usize,
    /// Overlap when tables or code are detected
    pub dense_chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            min_chunk_size: 100,
            max_chunk_size: 1200,
            dense_chunk_size: 400,
            dense_chunk_overlap: 120,
        }
    }
}

/// LLM (chat/completion provider) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Smaller fallback model used when the primary model fails
    pub fallback_model: String,
    /// Base temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Hard timeout for intent classification in seconds
    pub classify_timeout_secs: u64,
    /// Maximum completion tokens per generated answer
    pub max_completion_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.1".to_string(),
            fallback_model: "phi3".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
            classify_timeout_secs: 5,
            max_completion_tokens: 1024,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of results to return
    pub default_limit: usize,
    /// Minimum combined score for a result to be kept
    pub score_threshold: f32,
    /// Weight of the semantic (cosine) component
    pub semantic_weight: f32,
    /// Weight of the keyword component
    pub keyword_weight: f32,
    /// Candidates are capped at limit * rerank_multiplier before re-ranking
    pub rerank_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            score_threshold: 0.25,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            rerank_multiplier: 3,
        }
    }
}

/// Context selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total token budget for assembled context
    pub max_context_tokens: usize,
    /// Share of the budget reserved for document context (the rest is web)
    pub document_share: f32,
    /// Number of leading characters hashed for deduplication
    pub dedup_prefix_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 4000,
            document_share: 0.7,
            dedup_prefix_chars: 200,
        }
    }
}

/// Web search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Whether web search is available to the orchestrator
    pub enabled: bool,
    /// Maximum web passages to merge into evidence
    pub max_results: usize,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_results: 3,
        }
    }
}

/// Vectorization processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Bounded concurrency for batch vectorization; auto-detected from CPU
    /// count (capped at 3) when unset
    pub parallel_documents: Option<usize>,
    /// Timeout for vectorizing a single document in seconds
    pub document_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: None,
            document_timeout_secs: 300,
        }
    }
}

impl ProcessingConfig {
    /// Effective batch concurrency
    pub fn effective_parallel_documents(&self) -> usize {
        self.parallel_documents
            .unwrap_or_else(|| num_cpus::get().min(3))
            .max(1)
    }
}
