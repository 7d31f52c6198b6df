//! Transient retrieval and orchestration result types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::providers::web_search::WebPassage;

/// A retrieved chunk scored against the query.
///
/// Produced transiently per query; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Source document ID
    pub document_id: Uuid,
    /// Source document title
    pub document_title: String,
    /// Chunk content
    pub content: String,
    /// Combined similarity score in [0, 1]
    pub similarity: f32,
    /// Chunk index within the document
    pub chunk_index: u32,
    /// Semantic (cosine) component, when hybrid scoring ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_score: Option<f32>,
    /// Keyword component, when hybrid scoring ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f32>,
}

/// A citation linking an answer back to an evidence reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based evidence reference number as cited in the answer
    pub reference: usize,
    /// Source document ID for RAG evidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    /// Source title (document title or web page title)
    pub title: String,
    /// Source URL for web evidence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Exact snippet from the source
    pub snippet: String,
    /// Similarity score of the underlying evidence, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
}

/// A single item of evidence handed to generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceItem {
    /// A chunk retrieved from the user's documents
    RagChunk(SearchResult),
    /// A passage retrieved from the web
    WebResult(WebPassage),
}

impl EvidenceItem {
    /// Text content of the evidence
    pub fn content(&self) -> &str {
        match self {
            Self::RagChunk(result) => &result.content,
            Self::WebResult(passage) => &passage.text,
        }
    }

    /// Display title of the evidence source
    pub fn title(&self) -> &str {
        match self {
            Self::RagChunk(result) => &result.document_title,
            Self::WebResult(passage) => &passage.title,
        }
    }

    /// Estimated token count (chars / 4)
    pub fn estimated_tokens(&self) -> usize {
        self.content().chars().count() / 4
    }
}

/// The merged, token-budgeted set of evidence for one orchestrated query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Ordered evidence; reference numbers are 1-based positions in this list
    pub items: Vec<EvidenceItem>,
    /// Estimated total tokens across all items
    pub total_tokens: usize,
}

impl EvidenceBundle {
    /// Build a bundle from ordered items, accounting tokens
    pub fn new(items: Vec<EvidenceItem>) -> Self {
        let total_tokens = items.iter().map(EvidenceItem::estimated_tokens).sum();
        Self { items, total_tokens }
    }

    /// Number of distinct source documents among RAG items
    pub fn distinct_documents(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        for item in &self.items {
            if let EvidenceItem::RagChunk(result) = item {
                seen.insert(result.document_id);
            }
        }
        seen.len()
    }

    /// Number of web passages in the bundle
    pub fn web_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, EvidenceItem::WebResult(_)))
            .count()
    }
}

/// Advisory result of grounding verification; never blocks the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Whether the evidence meets the task's citation/coverage requirements
    pub is_valid: bool,
    /// Human-readable problems found
    pub errors: Vec<String>,
}

impl VerificationReport {
    /// A passing report
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }
}

/// A completed, grounded answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    /// Generated answer text
    pub content: String,
    /// Citations extracted from the answer
    pub citations: Vec<Citation>,
    /// Overall confidence in [0, 1], mean similarity of cited evidence
    pub confidence: f32,
    /// The verification report produced before generation
    pub verification: VerificationReport,
    /// Whether the web path contributed evidence
    pub used_web: bool,
    /// Total estimated evidence tokens
    pub evidence_tokens: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Terminal state of an orchestrated query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Generation succeeded
    Completed(RagAnswer),
    /// The cancellation token fired before generation
    Cancelled,
}

impl QueryOutcome {
    /// The answer, if the query completed
    pub fn answer(&self) -> Option<&RagAnswer> {
        match self {
            Self::Completed(answer) => Some(answer),
            Self::Cancelled => None,
        }
    }

    /// Whether the query was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Outcome of vectorizing a single document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorizeReport {
    /// Changes processed (0 when the document was skipped as unchanged)
    pub chunks_processed: usize,
    /// Added spans observed in the diff
    pub chunks_added: usize,
    /// Modified spans observed in the diff
    pub chunks_updated: usize,
    /// Deleted spans observed in the diff
    pub chunks_deleted: usize,
    /// Per-change failures; successful work is still persisted
    pub errors: Vec<String>,
}

impl VectorizeReport {
    /// A report for a document skipped as unchanged
    pub fn skipped() -> Self {
        Self::default()
    }
}
