//! Document, chunk, version, and change types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document as read from the relational store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Document ID
    pub id: Uuid,
    /// Owning user ID
    pub user_id: Uuid,
    /// Document title
    pub title: String,
    /// Plain-text content used for chunking and embedding
    pub content: String,
    /// Whether vectorization has succeeded at least once
    pub is_vectorized: bool,
    /// Last update timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A chunk of a document's text stored with its own embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Text content
    pub content: String,
    /// Embedding vector; dimension is fixed per configured model
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Chunk index within the document
    pub chunk_index: u32,
}

impl DocumentChunk {
    /// Create a new chunk without an embedding
    pub fn new(document_id: Uuid, content: String, chunk_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content,
            embedding: Vec::new(),
            chunk_index,
        }
    }
}

/// A recorded vectorization of a document's content.
///
/// Exactly one current version exists per document; once vectorization
/// succeeds its hash equals the hash of the stored content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    /// Document ID
    pub document_id: Uuid,
    /// SHA-256 hex digest of the content at vectorization time
    pub content_hash: String,
    /// Content length in characters
    pub content_length: usize,
    /// Number of chunk rows produced
    pub chunks_count: usize,
    /// When vectorization completed
    pub vectorized_at: chrono::DateTime<chrono::Utc>,
}

/// Kind of content change between two document versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentChangeKind {
    Added,
    Modified,
    Deleted,
}

/// A contiguous span that changed between the previous and new content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChange {
    /// Change kind
    pub kind: DocumentChangeKind,
    /// Start of the affected span (character offset)
    pub start_index: usize,
    /// End of the affected span (exclusive character offset)
    pub end_index: usize,
    /// Removed text, for deleted/modified spans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    /// Inserted text, for added/modified spans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
}

impl DocumentChange {
    /// An added span
    pub fn added(start_index: usize, end_index: usize, new_content: String) -> Self {
        Self {
            kind: DocumentChangeKind::Added,
            start_index,
            end_index,
            old_content: None,
            new_content: Some(new_content),
        }
    }

    /// A deleted span
    pub fn deleted(start_index: usize, end_index: usize, old_content: String) -> Self {
        Self {
            kind: DocumentChangeKind::Deleted,
            start_index,
            end_index,
            old_content: Some(old_content),
            new_content: None,
        }
    }
}
