//! Query request and intent types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of query as labelled by the intent classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Factual,
    Analytical,
    Creative,
    Comparative,
    Procedural,
    Summarization,
}

impl IntentKind {
    /// Parse a classifier label, case-insensitively
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "factual" => Some(Self::Factual),
            "analytical" => Some(Self::Analytical),
            "creative" => Some(Self::Creative),
            "comparative" => Some(Self::Comparative),
            "procedural" => Some(Self::Procedural),
            "summarization" => Some(Self::Summarization),
            _ => None,
        }
    }

    /// Whether this intent describes a writing task
    pub fn is_write_task(&self) -> bool {
        matches!(self, Self::Creative | Self::Summarization)
    }
}

/// Retrieval strategy recommended for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    Semantic,
    Hybrid,
    Keyword,
}

impl RetrievalStrategy {
    /// Parse a classifier label, case-insensitively
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "semantic" => Some(Self::Semantic),
            "hybrid" => Some(Self::Hybrid),
            "keyword" => Some(Self::Keyword),
            _ => None,
        }
    }
}

/// Classified intent with recommended retrieval parameters.
///
/// Always structurally valid: classification failures produce
/// [`QueryIntent::fallback`] rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    /// Intent kind
    pub kind: IntentKind,
    /// Classifier confidence in [0, 1]
    pub confidence: f32,
    /// Recommended retrieval strategy
    pub strategy: RetrievalStrategy,
    /// Recommended result limit
    pub suggested_limit: usize,
    /// Whether the query needs document context at all
    pub needs_context: bool,
}

impl QueryIntent {
    /// The hard-coded default used when classification fails or times out
    pub fn fallback() -> Self {
        Self {
            kind: IntentKind::Factual,
            confidence: 0.5,
            strategy: RetrievalStrategy::Hybrid,
            suggested_limit: 5,
            needs_context: true,
        }
    }
}

/// An orchestrated query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The user's question
    pub question: String,
    /// Owning user ID (scopes vector store and document lookups)
    pub user_id: Uuid,
    /// Restrict retrieval to specific documents (optional)
    #[serde(default)]
    pub document_filter: Option<Vec<Uuid>>,
    /// Number of chunks to retrieve (default: 5)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Override the configured context token budget (optional)
    #[serde(default)]
    pub max_context_tokens: Option<usize>,
}

fn default_top_k() -> usize {
    5
}

impl QueryRequest {
    /// Create a new query for a user
    pub fn new(question: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            question: question.into(),
            user_id,
            document_filter: None,
            top_k: default_top_k(),
            max_context_tokens: None,
        }
    }

    /// Set the number of results to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Filter retrieval to specific documents
    pub fn with_documents(mut self, doc_ids: Vec<Uuid>) -> Self {
        self.document_filter = Some(doc_ids);
        self
    }
}
