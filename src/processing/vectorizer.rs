//! Incremental vectorizer keeping the vector store and relational rows
//! consistent with minimal re-work

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::ProcessingConfig;
use crate::embeddings::EmbeddingGateway;
use crate::error::{Error, Result};
use crate::ingestion::AdaptiveChunker;
use crate::providers::{DocumentStoreProvider, VectorStoreProvider};
use crate::types::{DocumentChange, DocumentChangeKind, DocumentChunk, VectorizeReport};

use super::change_tracker::{diff_content, hash_content, needs_revectorization};

/// Keeps stored vectors and chunk/version rows consistent with document
/// content, skipping documents whose hash is unchanged.
///
/// Each detected change re-embeds the entire current document into one vector
/// upserted under the document's ID; chunk rows are rebuilt alongside so
/// retrieval has a per-chunk corpus.
pub struct IncrementalVectorizer {
    document_store: Arc<dyn DocumentStoreProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    gateway: EmbeddingGateway,
    chunker: AdaptiveChunker,
    config: ProcessingConfig,
}

impl IncrementalVectorizer {
    /// Create a new vectorizer
    pub fn new(
        document_store: Arc<dyn DocumentStoreProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        gateway: EmbeddingGateway,
        chunker: AdaptiveChunker,
        config: ProcessingConfig,
    ) -> Self {
        Self {
            document_store,
            vector_store,
            gateway,
            chunker,
            config,
        }
    }

    /// Vectorize a document's content.
    ///
    /// Skips entirely (no provider calls) when `force` is false and the stored
    /// version hash already matches `content`. Partial failures persist the
    /// successful work and are reported in the returned `errors`; the document
    /// is marked vectorized when at least one change succeeded.
    pub async fn vectorize(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        content: &str,
        force: bool,
    ) -> Result<VectorizeReport> {
        let latest = self.document_store.latest_version(document_id).await?;

        if !force && !needs_revectorization(latest.as_ref(), content) {
            tracing::debug!("Document {} unchanged, skipping vectorization", document_id);
            return Ok(VectorizeReport::skipped());
        }

        // Diff against the stored row's content; a missing or unreadable prior
        // document degrades to treating the entire new content as added.
        let (old_content, title) = match self.document_store.get_document(document_id, user_id).await {
            Ok(Some(doc)) => (doc.content, doc.title),
            Ok(None) => return Err(Error::DocumentNotFound(document_id.to_string())),
            Err(e) => {
                tracing::warn!(
                    "Could not read prior content for {}: {}, treating all content as added",
                    document_id,
                    e
                );
                (String::new(), String::new())
            }
        };

        let mut changes = diff_content(&old_content, content);
        if changes.is_empty() {
            // Forced re-vectorization, or the row already holds the new
            // content: embed everything once.
            changes.push(DocumentChange::added(
                0,
                content.chars().count(),
                content.to_string(),
            ));
        }

        let mut report = VectorizeReport {
            chunks_processed: changes.len(),
            ..Default::default()
        };
        for change in &changes {
            match change.kind {
                DocumentChangeKind::Added => report.chunks_added += 1,
                DocumentChangeKind::Modified => report.chunks_updated += 1,
                DocumentChangeKind::Deleted => report.chunks_deleted += 1,
            }
        }

        let content_hash = hash_content(content);
        let mut succeeded = 0usize;

        for (index, change) in changes.iter().enumerate() {
            match self
                .apply_change(document_id, user_id, content, &title, &content_hash)
                .await
            {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    tracing::warn!(
                        "Change {}/{} failed for document {}: {}",
                        index + 1,
                        changes.len(),
                        document_id,
                        e
                    );
                    report
                        .errors
                        .push(format!("change {} ({:?}): {}", index + 1, change.kind, e));
                }
            }
        }

        if succeeded == 0 {
            tracing::error!(
                "All {} changes failed for document {}",
                changes.len(),
                document_id
            );
            return Ok(report);
        }

        // Rebuild the relational chunk rows for retrieval
        let chunk_texts = self.chunker.chunk(content);
        let mut chunks_count = 0usize;
        match self.gateway.embed_batch(&chunk_texts).await {
            Ok(embeddings) => {
                let rows: Vec<DocumentChunk> = chunk_texts
                    .into_iter()
                    .zip(embeddings)
                    .enumerate()
                    .map(|(index, (text, embedding))| {
                        let mut chunk = DocumentChunk::new(document_id, text, index as u32);
                        chunk.embedding = embedding;
                        chunk
                    })
                    .collect();
                chunks_count = rows.len();
                self.document_store.replace_chunks(document_id, rows).await?;
            }
            Err(e) => {
                tracing::warn!("Chunk row rebuild failed for document {}: {}", document_id, e);
                report.errors.push(format!("chunk rows: {}", e));
            }
        }

        self.document_store
            .create_version(
                document_id,
                content_hash,
                content.chars().count(),
                chunks_count,
            )
            .await?;
        self.document_store.mark_vectorized(document_id).await?;

        tracing::info!(
            "Vectorized document {}: {} changes ({} ok), {} chunk rows",
            document_id,
            report.chunks_processed,
            succeeded,
            chunks_count
        );

        Ok(report)
    }

    /// Embed the entire current content and upsert it under the document key
    async fn apply_change(
        &self,
        document_id: Uuid,
        user_id: Uuid,
        content: &str,
        title: &str,
        content_hash: &str,
    ) -> Result<()> {
        let vector = self.gateway.embed(content).await?;

        let mut metadata = HashMap::new();
        metadata.insert("user_id".to_string(), serde_json::json!(user_id.to_string()));
        metadata.insert("title".to_string(), serde_json::json!(title));
        metadata.insert("content_hash".to_string(), serde_json::json!(content_hash));

        self.vector_store
            .upsert(document_id, vector, metadata)
            .await
            .map_err(|e| e.in_operation("vector upsert", document_id))
    }

    /// Vectorize many documents with bounded concurrency.
    ///
    /// Content is read from each document's stored row. One document's
    /// failure or timeout never aborts its siblings; results are collected
    /// per document.
    pub async fn batch_vectorize(
        &self,
        user_id: Uuid,
        document_ids: &[Uuid],
        force: bool,
    ) -> HashMap<Uuid, Result<VectorizeReport>> {
        let semaphore = Arc::new(Semaphore::new(self.config.effective_parallel_documents()));
        let document_timeout = Duration::from_secs(self.config.document_timeout_secs);

        let futures: Vec<_> = document_ids
            .iter()
            .copied()
            .map(|document_id| {
                let semaphore = semaphore.clone();

                async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (
                                document_id,
                                Err(Error::internal("vectorization semaphore closed")),
                            )
                        }
                    };

                    let work = async {
                        let doc = self
                            .document_store
                            .get_document(document_id, user_id)
                            .await?
                            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;
                        self.vectorize(document_id, user_id, &doc.content, force).await
                    };

                    let result = match timeout(document_timeout, work).await {
                        Ok(result) => result,
                        Err(_) => Err(Error::Timeout(format!(
                            "vectorization exceeded {}s for document {}",
                            document_timeout.as_secs(),
                            document_id
                        ))),
                    };

                    if let Err(ref e) = result {
                        tracing::warn!("Batch vectorization failed for {}: {}", document_id, e);
                    }

                    (document_id, result)
                }
            })
            .collect();

        join_all(futures).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, ProcessingConfig};
    use crate::providers::memory::{InMemoryDocumentStore, InMemoryVectorStore};
    use crate::providers::{DocumentStoreProvider as _, EmbeddingProvider, VectorStoreProvider as _};
    use crate::types::StoredDocument;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder that counts provider calls
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn vector_for(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; 4];
            for (i, b) in text.bytes().enumerate() {
                v[i % 4] += b as f32 / 255.0;
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::vector_for(text))
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn setup() -> (
        Arc<InMemoryDocumentStore>,
        Arc<InMemoryVectorStore>,
        Arc<CountingEmbedder>,
        IncrementalVectorizer,
    ) {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let embedder = CountingEmbedder::new();

        let vectorizer = IncrementalVectorizer::new(
            documents.clone(),
            vectors.clone(),
            EmbeddingGateway::new(embedder.clone()),
            AdaptiveChunker::new(ChunkingConfig::default()),
            ProcessingConfig::default(),
        );

        (documents, vectors, embedder, vectorizer)
    }

    fn seed_document(store: &InMemoryDocumentStore, user_id: Uuid, content: &str) -> Uuid {
        let doc = StoredDocument {
            id: Uuid::new_v4(),
            user_id,
            title: "Notes".to_string(),
            content: content.to_string(),
            is_vectorized: false,
            updated_at: chrono::Utc::now(),
        };
        let id = doc.id;
        store.put_document(doc);
        id
    }

    #[tokio::test]
    async fn unchanged_document_is_skipped_without_provider_calls() {
        let (documents, _, embedder, vectorizer) = setup();
        let user_id = Uuid::new_v4();
        let content = "A document about retrieval systems and their invariants.";
        let doc_id = seed_document(&documents, user_id, content);

        let first = vectorizer
            .vectorize(doc_id, user_id, content, false)
            .await
            .unwrap();
        assert!(first.chunks_processed >= 1);
        assert!(first.errors.is_empty());
        let calls_after_first = embedder.call_count();
        assert!(calls_after_first > 0);

        // Second run with identical content: no work, no provider calls
        let second = vectorizer
            .vectorize(doc_id, user_id, content, false)
            .await
            .unwrap();
        assert_eq!(second.chunks_processed, 0);
        assert_eq!(embedder.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn content_change_triggers_revectorization() {
        let (documents, vectors, _, vectorizer) = setup();
        let user_id = Uuid::new_v4();
        let doc_id = seed_document(&documents, user_id, "Hello world");

        vectorizer
            .vectorize(doc_id, user_id, "Hello world", false)
            .await
            .unwrap();

        // The row still holds "Hello world"; the new content inserts a word
        let report = vectorizer
            .vectorize(doc_id, user_id, "Hello brave world", false)
            .await
            .unwrap();

        assert_eq!(report.chunks_processed, 1);
        assert_eq!(report.chunks_added, 1);
        assert!(report.errors.is_empty());

        // Doc-keyed upsert: still exactly one vector
        assert_eq!(vectors.len().await.unwrap(), 1);

        let version = documents.latest_version(doc_id).await.unwrap().unwrap();
        assert_eq!(version.content_hash, hash_content("Hello brave world"));
    }

    #[tokio::test]
    async fn force_revectorizes_unchanged_content() {
        let (documents, _, embedder, vectorizer) = setup();
        let user_id = Uuid::new_v4();
        let content = "Stable content that does not change.";
        let doc_id = seed_document(&documents, user_id, content);

        vectorizer
            .vectorize(doc_id, user_id, content, false)
            .await
            .unwrap();
        let calls = embedder.call_count();

        let report = vectorizer
            .vectorize(doc_id, user_id, content, true)
            .await
            .unwrap();
        assert_eq!(report.chunks_processed, 1);
        assert!(embedder.call_count() > calls);
    }

    #[tokio::test]
    async fn batch_vectorize_collects_per_document_results() {
        let (documents, _, _, vectorizer) = setup();
        let user_id = Uuid::new_v4();
        let doc_a = seed_document(&documents, user_id, "First document about apples.");
        let doc_b = seed_document(&documents, user_id, "Second document about oranges.");
        let missing = Uuid::new_v4();

        let results = vectorizer
            .batch_vectorize(user_id, &[doc_a, doc_b, missing], false)
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[&doc_a].is_ok());
        assert!(results[&doc_b].is_ok());
        assert!(matches!(
            results[&missing],
            Err(Error::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn marks_document_vectorized_after_success() {
        let (documents, _, _, vectorizer) = setup();
        let user_id = Uuid::new_v4();
        let doc_id = seed_document(&documents, user_id, "Some content worth vectorizing here.");

        vectorizer
            .vectorize(doc_id, user_id, "Some content worth vectorizing here.", false)
            .await
            .unwrap();

        let doc = documents.get_document(doc_id, user_id).await.unwrap().unwrap();
        assert!(doc.is_vectorized);
        assert!(!documents.list_chunks(doc_id).await.unwrap().is_empty());
    }
}
