//! Vector store provider trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;

/// A match returned from a vector store query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Key of the stored vector (the owning document's ID)
    pub document_id: Uuid,
    /// Similarity score in [0, 1], higher is more similar
    pub score: f32,
    /// Stored metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Trait for vector storage and similarity search.
///
/// Vectors are keyed by document ID so upserts are idempotent: re-vectorizing
/// a document replaces its entry rather than accumulating duplicates.
///
/// Implementations:
/// - [`super::memory::InMemoryVectorStore`]: brute-force cosine, for tests and
///   local use
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert or replace the vector stored under `document_id`
    async fn upsert(
        &self,
        document_id: Uuid,
        vector: Vec<f32>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<()>;

    /// Top-K similarity search scoped to one user
    async fn query(
        &self,
        query_vector: &[f32],
        user_id: Uuid,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>>;

    /// Delete the vector stored under `document_id`, if any
    async fn delete(&self, document_id: Uuid) -> Result<bool>;

    /// Total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if the store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
