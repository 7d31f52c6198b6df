//! Relational document store provider trait
//!
//! The core only touches document text, chunk rows, and version history
//! through these narrow accessors; everything else about the relational
//! schema is the host application's business.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{DocumentChunk, DocumentVersion, StoredDocument};

/// Trait for the relational store accessors consumed by the core.
///
/// Implementations:
/// - [`super::memory::InMemoryDocumentStore`]: for tests and local use
#[async_trait]
pub trait DocumentStoreProvider: Send + Sync {
    /// Fetch a document owned by `user_id`
    async fn get_document(&self, id: Uuid, user_id: Uuid) -> Result<Option<StoredDocument>>;

    /// List all documents owned by `user_id`
    async fn list_documents(&self, user_id: Uuid) -> Result<Vec<StoredDocument>>;

    /// List a document's chunk rows ordered by chunk index
    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<DocumentChunk>>;

    /// Replace all chunk rows for a document
    async fn replace_chunks(&self, document_id: Uuid, chunks: Vec<DocumentChunk>) -> Result<()>;

    /// Record a new current version for a document
    async fn create_version(
        &self,
        document_id: Uuid,
        content_hash: String,
        content_length: usize,
        chunks_count: usize,
    ) -> Result<()>;

    /// Fetch the current version for a document, if any
    async fn latest_version(&self, document_id: Uuid) -> Result<Option<DocumentVersion>>;

    /// Mark a document as vectorized
    async fn mark_vectorized(&self, document_id: Uuid) -> Result<()>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
