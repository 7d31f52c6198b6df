//! Hybrid semantic + keyword retrieval with multi-query re-ranking
//!
//! The adaptive path is split into two functions by construction: intent
//! classification happens in [`super::intent`], and `search` here is strictly
//! non-adaptive, so recursive re-classification is impossible.

use std::sync::Arc;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::config::RetrievalConfig;
use crate::embeddings::EmbeddingGateway;
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::providers::{DocumentStoreProvider, VectorStoreProvider};
use crate::types::{QueryIntent, RetrievalStrategy, SearchResult};

use super::intent::IntentClassifier;
use super::preprocess::QueryPreprocessor;

/// Cosine similarity of two vectors.
///
/// Returns None when the vectors have different lengths, are empty, or either
/// has near-zero magnitude; the value is otherwise in [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        return None;
    }
    Some((dot / (mag_a * mag_b)).clamp(-1.0, 1.0))
}

/// Reconcile a stored vector against the active embedding dimension.
///
/// A shorter vector at a known legacy dimension is zero-padded up to the
/// active dimension; anything else is excluded (None) rather than an error.
pub fn pad_to_dimension(
    vector: &[f32],
    active_dim: usize,
    legacy_dims: &[usize],
) -> Option<Vec<f32>> {
    if vector.len() == active_dim {
        return Some(vector.to_vec());
    }
    if vector.len() < active_dim && legacy_dims.contains(&vector.len()) {
        let mut padded = vector.to_vec();
        padded.resize(active_dim, 0.0);
        return Some(padded);
    }
    None
}

/// Keyword component: term overlap ratio + phrase bonus + proximity bonus
fn keyword_score(query: &str, content: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let content_lower = content.to_lowercase();

    let terms: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|t| t.chars().count() >= 3)
        .collect();
    if terms.is_empty() {
        return 0.0;
    }

    let positions: Vec<usize> = terms
        .iter()
        .filter_map(|t| content_lower.find(t))
        .collect();
    let overlap_ratio = positions.len() as f32 / terms.len() as f32;

    let phrase_bonus = if content_lower.contains(query_lower.trim()) {
        0.2
    } else {
        0.0
    };

    // Matched terms clustered within a small window score extra
    let proximity_bonus = if positions.len() >= 2 {
        let min = positions.iter().min().copied().unwrap_or(0);
        let max = positions.iter().max().copied().unwrap_or(0);
        if max - min < 120 {
            0.1
        } else {
            0.0
        }
    } else {
        0.0
    };

    overlap_ratio + phrase_bonus + proximity_bonus
}

/// Small bonus for chunks carrying numbers or specific-term markers
fn quality_bonus(content: &str) -> f32 {
    let mut bonus = 0.0;
    if content.chars().any(|c| c.is_ascii_digit()) {
        bonus += 0.05;
    }
    if content.contains('%') || content.contains('$') || content.contains('#') {
        bonus += 0.05;
    }
    bonus
}

/// Options for one non-adaptive search call
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Number of results to return
    pub limit: usize,
    /// Minimum combined score
    pub threshold: f32,
    /// Scoring strategy
    pub strategy: RetrievalStrategy,
    /// Weight of the semantic component
    pub semantic_weight: f32,
    /// Weight of the keyword component
    pub keyword_weight: f32,
    /// Query variants for multi-query re-ranking (primary query first)
    pub variants: Vec<String>,
    /// Restrict results to specific documents
    pub document_filter: Option<Vec<Uuid>>,
}

impl SearchOptions {
    /// Defaults from retrieval configuration
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            limit: config.default_limit,
            threshold: config.score_threshold,
            strategy: RetrievalStrategy::Hybrid,
            semantic_weight: config.semantic_weight,
            keyword_weight: config.keyword_weight,
            variants: Vec::new(),
            document_filter: None,
        }
    }
}

/// A retrieval plan derived from a classified intent
#[derive(Debug, Clone)]
pub struct RetrievalPlan {
    /// Search options to run with
    pub options: SearchOptions,
    /// Whether query expansion is worth the provider call
    pub use_expansion: bool,
    /// Whether query rewriting is worth the provider call
    pub use_rewriting: bool,
}

/// Map a classified intent to retrieval parameters
pub fn params_for_intent(intent: &QueryIntent, config: &RetrievalConfig) -> RetrievalPlan {
    let mut options = SearchOptions::from_config(config);
    options.strategy = intent.strategy;
    options.limit = intent.suggested_limit;

    use crate::types::IntentKind::*;
    let (use_expansion, use_rewriting) = match intent.kind {
        Factual => (false, false),
        Analytical => {
            options.threshold *= 0.8;
            options.limit = options.limit.max(8);
            (true, true)
        }
        Creative => {
            options.threshold *= 0.6;
            (false, true)
        }
        Comparative => {
            options.limit = options.limit.max(8);
            (true, false)
        }
        Procedural => (false, true),
        Summarization => {
            options.threshold *= 0.5;
            options.limit = options.limit.max(10);
            (false, false)
        }
    };

    RetrievalPlan {
        options,
        use_expansion,
        use_rewriting,
    }
}

/// Internal candidate carrying its reconciled embedding through re-ranking
struct ScoredChunk {
    result: SearchResult,
    embedding: Vec<f32>,
}

/// Executes similarity + keyword scoring against stored vectors and re-ranks
pub struct HybridRetriever {
    vector_store: Arc<dyn VectorStoreProvider>,
    document_store: Arc<dyn DocumentStoreProvider>,
    gateway: EmbeddingGateway,
    config: RetrievalConfig,
    legacy_dimensions: Vec<usize>,
    metrics: Arc<PipelineMetrics>,
}

impl HybridRetriever {
    /// Create a retriever
    pub fn new(
        vector_store: Arc<dyn VectorStoreProvider>,
        document_store: Arc<dyn DocumentStoreProvider>,
        gateway: EmbeddingGateway,
        config: RetrievalConfig,
        legacy_dimensions: Vec<usize>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            vector_store,
            document_store,
            gateway,
            config,
            legacy_dimensions,
            metrics,
        }
    }

    /// Non-adaptive hybrid search.
    ///
    /// Output is sorted by non-increasing combined score. A vector store
    /// failure degrades to the relational keyword scan instead of failing the
    /// query.
    pub async fn search(
        &self,
        query: &str,
        user_id: Uuid,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if options.strategy == RetrievalStrategy::Keyword {
            return self.keyword_scan(query, user_id, options).await;
        }

        let query_vector = self.gateway.embed(query).await?;

        let candidate_cap = options.limit * self.config.rerank_multiplier.max(1);
        let matches = match self
            .vector_store
            .query(&query_vector, user_id, candidate_cap)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(
                    "Vector store unavailable ({}), falling back to keyword scan",
                    e
                );
                self.metrics.record_vector_store_fallback();
                return self.keyword_scan(query, user_id, options).await;
            }
        };

        let keyword_weight = match options.strategy {
            RetrievalStrategy::Semantic => 0.0,
            _ => options.keyword_weight,
        };

        let mut candidates: Vec<ScoredChunk> = Vec::new();
        for vector_match in matches {
            if let Some(filter) = &options.document_filter {
                if !filter.contains(&vector_match.document_id) {
                    continue;
                }
            }

            let title = vector_match
                .metadata
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled")
                .to_string();

            let chunks = self
                .document_store
                .list_chunks(vector_match.document_id)
                .await?;

            for chunk in chunks {
                // Stale-dimension chunks are excluded, never mixed into scoring
                let embedding = match pad_to_dimension(
                    &chunk.embedding,
                    self.gateway.dimensions(),
                    &self.legacy_dimensions,
                ) {
                    Some(embedding) => embedding,
                    None => {
                        tracing::debug!(
                            "Excluding chunk {} of {} with incompatible dimension {}",
                            chunk.chunk_index,
                            vector_match.document_id,
                            chunk.embedding.len()
                        );
                        continue;
                    }
                };

                let semantic = match cosine_similarity(&query_vector, &embedding) {
                    Some(cos) => (cos + 1.0) / 2.0,
                    None => continue,
                };
                let keyword = keyword_score(query, &chunk.content);
                let combined = options.semantic_weight * semantic
                    + keyword_weight * keyword
                    + quality_bonus(&chunk.content);

                if combined < options.threshold {
                    continue;
                }

                candidates.push(ScoredChunk {
                    result: SearchResult {
                        document_id: chunk.document_id,
                        document_title: title.clone(),
                        content: chunk.content,
                        similarity: combined.min(1.0),
                        chunk_index: chunk.chunk_index,
                        semantic_score: Some(semantic),
                        keyword_score: Some(keyword),
                    },
                    embedding,
                });
            }
        }

        candidates.sort_by(|a, b| {
            b.result
                .similarity
                .partial_cmp(&a.result.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(candidate_cap);

        let results = if options.variants.len() > 1 {
            self.rerank_multi_query(candidates, &options.variants, options.limit)
                .await?
        } else {
            candidates.truncate(options.limit);
            candidates.into_iter().map(|c| c.result).collect()
        };

        Ok(results)
    }

    /// Re-rank candidates against every query variant.
    ///
    /// Combined score = 0.4·max + 0.3·mean + 0.2·consistency + 0.1·length,
    /// where consistency is the inverse of the cross-variant variance.
    async fn rerank_multi_query(
        &self,
        candidates: Vec<ScoredChunk>,
        variants: &[String],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let variant_vectors = self.gateway.embed_batch(variants).await?;

        let mut reranked: Vec<SearchResult> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let sims: Vec<f32> = variant_vectors
                    .iter()
                    .filter_map(|v| cosine_similarity(v, &candidate.embedding))
                    .map(|cos| (cos + 1.0) / 2.0)
                    .collect();
                if sims.is_empty() {
                    return None;
                }

                let max = sims.iter().cloned().fold(f32::MIN, f32::max);
                let mean = sims.iter().sum::<f32>() / sims.len() as f32;
                let variance = sims
                    .iter()
                    .map(|s| (s - mean) * (s - mean))
                    .sum::<f32>()
                    / sims.len() as f32;
                let consistency = 1.0 / (1.0 + variance);
                let length_bonus =
                    (candidate.result.content.chars().count() as f32 / 800.0).min(1.0);

                let combined =
                    0.4 * max + 0.3 * mean + 0.2 * consistency + 0.1 * length_bonus;

                let mut result = candidate.result;
                result.similarity = combined.min(1.0);
                Some(result)
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        reranked.truncate(limit);

        Ok(reranked)
    }

    /// Keyword-containment scan over relational rows.
    ///
    /// Lower fidelity than vector search; used as the chosen strategy for
    /// keyword queries and as the degraded path when the vector store fails.
    async fn keyword_scan(
        &self,
        query: &str,
        user_id: Uuid,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let documents = self.document_store.list_documents(user_id).await?;

        let mut results = Vec::new();
        for document in documents {
            if let Some(filter) = &options.document_filter {
                if !filter.contains(&document.id) {
                    continue;
                }
            }

            let chunks = self.document_store.list_chunks(document.id).await?;
            if chunks.is_empty() {
                // Not yet chunked: scan the raw content as one unit
                let score = keyword_score(query, &document.content);
                if score > 0.0 {
                    results.push(SearchResult {
                        document_id: document.id,
                        document_title: document.title.clone(),
                        content: document.content.chars().take(600).collect(),
                        similarity: score.min(1.0),
                        chunk_index: 0,
                        semantic_score: None,
                        keyword_score: Some(score),
                    });
                }
                continue;
            }

            for chunk in chunks {
                let score = keyword_score(query, &chunk.content);
                if score > 0.0 {
                    results.push(SearchResult {
                        document_id: chunk.document_id,
                        document_title: document.title.clone(),
                        content: chunk.content,
                        similarity: score.min(1.0),
                        chunk_index: chunk.chunk_index,
                        semantic_score: None,
                        keyword_score: Some(score),
                    });
                }
            }
        }

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(options.limit);

        Ok(results)
    }

    /// Adaptive retrieval: classify, map intent to parameters, then run the
    /// strictly non-adaptive `search`.
    pub async fn adaptive_search(
        &self,
        classifier: &IntentClassifier,
        preprocessor: &QueryPreprocessor,
        query: &str,
        user_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<(QueryIntent, Vec<SearchResult>)> {
        let intent = classifier.classify(query).await;
        let mut plan = params_for_intent(&intent, &self.config);

        let effective_query = if plan.use_rewriting {
            preprocessor.rewrite(query, cancel).await
        } else {
            query.to_string()
        };

        if plan.use_expansion {
            plan.options.variants = preprocessor.expand(&effective_query, cancel).await;
        }

        let results = self.search(&effective_query, user_id, &plan.options).await?;
        Ok((intent, results))
    }
}
