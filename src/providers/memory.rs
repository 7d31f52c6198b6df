//! In-memory provider implementations for tests and local use
//!
//! Vector search is brute-force cosine similarity over all stored vectors;
//! upserts are keyed by document ID so re-vectorization replaces rather than
//! accumulates.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::retrieval::search::cosine_similarity;
use crate::types::{DocumentChunk, DocumentVersion, StoredDocument};

use super::document_store::DocumentStoreProvider;
use super::vector_store::{VectorMatch, VectorStoreProvider};

struct StoredVector {
    user_id: Uuid,
    vector: Vec<f32>,
    metadata: HashMap<String, serde_json::Value>,
}

/// In-memory vector store keyed by document ID
#[derive(Default)]
pub struct InMemoryVectorStore {
    vectors: RwLock<HashMap<Uuid, StoredVector>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn upsert(
        &self,
        document_id: Uuid,
        vector: Vec<f32>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::vector_store("refusing to store empty vector"));
        }

        let user_id = metadata
            .get("user_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::nil);

        self.vectors.write().insert(
            document_id,
            StoredVector {
                user_id,
                vector,
                metadata,
            },
        );
        Ok(())
    }

    async fn query(
        &self,
        query_vector: &[f32],
        user_id: Uuid,
        top_k: usize,
    ) -> Result<Vec<VectorMatch>> {
        let vectors = self.vectors.read();

        let mut matches: Vec<VectorMatch> = vectors
            .iter()
            .filter(|(_, stored)| stored.user_id == user_id)
            .filter_map(|(id, stored)| {
                cosine_similarity(query_vector, &stored.vector).map(|sim| VectorMatch {
                    document_id: *id,
                    // Map [-1, 1] into [0, 1]
                    score: (sim + 1.0) / 2.0,
                    metadata: stored.metadata.clone(),
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn delete(&self, document_id: Uuid) -> Result<bool> {
        Ok(self.vectors.write().remove(&document_id).is_some())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.vectors.read().len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// In-memory relational document store
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, StoredDocument>>,
    chunks: RwLock<HashMap<Uuid, Vec<DocumentChunk>>>,
    versions: RwLock<HashMap<Uuid, DocumentVersion>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document row
    pub fn put_document(&self, document: StoredDocument) {
        self.documents.write().insert(document.id, document);
    }

    /// Replace a document's content, clearing its vectorized flag
    pub fn update_content(&self, document_id: Uuid, content: String) {
        if let Some(doc) = self.documents.write().get_mut(&document_id) {
            doc.content = content;
            doc.updated_at = chrono::Utc::now();
        }
    }
}

#[async_trait]
impl DocumentStoreProvider for InMemoryDocumentStore {
    async fn get_document(&self, id: Uuid, user_id: Uuid) -> Result<Option<StoredDocument>> {
        Ok(self
            .documents
            .read()
            .get(&id)
            .filter(|doc| doc.user_id == user_id)
            .cloned())
    }

    async fn list_documents(&self, user_id: Uuid) -> Result<Vec<StoredDocument>> {
        Ok(self
            .documents
            .read()
            .values()
            .filter(|doc| doc.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<DocumentChunk>> {
        let mut chunks = self
            .chunks
            .read()
            .get(&document_id)
            .cloned()
            .unwrap_or_default();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn replace_chunks(&self, document_id: Uuid, chunks: Vec<DocumentChunk>) -> Result<()> {
        self.chunks.write().insert(document_id, chunks);
        Ok(())
    }

    async fn create_version(
        &self,
        document_id: Uuid,
        content_hash: String,
        content_length: usize,
        chunks_count: usize,
    ) -> Result<()> {
        self.versions.write().insert(
            document_id,
            DocumentVersion {
                document_id,
                content_hash,
                content_length,
                chunks_count,
                vectorized_at: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn latest_version(&self, document_id: Uuid) -> Result<Option<DocumentVersion>> {
        Ok(self.versions.read().get(&document_id).cloned())
    }

    async fn mark_vectorized(&self, document_id: Uuid) -> Result<()> {
        let mut documents = self.documents.write();
        let doc = documents
            .get_mut(&document_id)
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;
        doc.is_vectorized = true;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_doc(user_id: Uuid, content: &str) -> StoredDocument {
        StoredDocument {
            id: Uuid::new_v4(),
            user_id,
            title: "Test".to_string(),
            content: content.to_string(),
            is_vectorized: false,
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn vector_upsert_is_idempotent() {
        let store = InMemoryVectorStore::new();
        let doc_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), serde_json::json!(user_id.to_string()));

        store
            .upsert(doc_id, vec![1.0, 0.0], metadata.clone())
            .await
            .unwrap();
        store.upsert(doc_id, vec![0.0, 1.0], metadata).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);

        let matches = store.query(&[0.0, 1.0], user_id, 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].score > 0.99);
    }

    #[tokio::test]
    async fn query_is_scoped_to_user() {
        let store = InMemoryVectorStore::new();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        let mut meta_a = HashMap::new();
        meta_a.insert("user_id".to_string(), serde_json::json!(user_a.to_string()));
        store.upsert(Uuid::new_v4(), vec![1.0, 0.0], meta_a).await.unwrap();

        let matches = store.query(&[1.0, 0.0], user_b, 5).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn document_store_round_trips_versions() {
        let store = InMemoryDocumentStore::new();
        let user_id = Uuid::new_v4();
        let doc = make_doc(user_id, "hello");
        let doc_id = doc.id;
        store.put_document(doc);

        assert!(store.latest_version(doc_id).await.unwrap().is_none());

        store
            .create_version(doc_id, "abc".to_string(), 5, 1)
            .await
            .unwrap();
        let version = store.latest_version(doc_id).await.unwrap().unwrap();
        assert_eq!(version.content_hash, "abc");
        assert_eq!(version.chunks_count, 1);

        store.mark_vectorized(doc_id).await.unwrap();
        let doc = store.get_document(doc_id, user_id).await.unwrap().unwrap();
        assert!(doc.is_vectorized);
    }
}
