//! Context selection and compression under a token budget

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::ContextConfig;
use crate::generation::PromptBuilder;
use crate::providers::{ChatMessage, ChatOptions, ChatProvider};
use crate::types::SearchResult;

/// Deduplicates, scores for quality/diversity, and compresses retrieval
/// results to fit a token budget
pub struct ContextSelector {
    chat: Arc<dyn ChatProvider>,
    config: ContextConfig,
}

impl ContextSelector {
    /// Create a selector backed by the given chat provider (for compression)
    pub fn new(chat: Arc<dyn ChatProvider>, config: ContextConfig) -> Self {
        Self { chat, config }
    }

    /// Select up to `limit` results.
    ///
    /// Duplicates (same document and leading content) collapse to one entry.
    /// Small candidate sets take the fast path ordered by similarity alone;
    /// larger sets are scored for quality and penalized for repeating the
    /// same document.
    pub fn select(&self, results: Vec<SearchResult>, query: &str, limit: usize) -> Vec<SearchResult> {
        let mut seen = HashSet::new();
        let mut deduped: Vec<SearchResult> = Vec::with_capacity(results.len());
        for result in results {
            let key = self.dedup_key(&result);
            if seen.insert(key) {
                deduped.push(result);
            }
        }

        // Fast path: nothing to gain from expensive scoring
        if deduped.len() <= limit * 2 {
            deduped.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            deduped.truncate(limit);
            return deduped;
        }

        let mut selected: Vec<SearchResult> = Vec::with_capacity(limit);
        let mut doc_counts: HashMap<uuid::Uuid, usize> = HashMap::new();

        while selected.len() < limit && !deduped.is_empty() {
            let mut best_index = 0;
            let mut best_score = f32::MIN;

            for (index, candidate) in deduped.iter().enumerate() {
                let repeats = *doc_counts.get(&candidate.document_id).unwrap_or(&0);
                let score = candidate.similarity + 0.3 * quality_score(query, &candidate.content)
                    - 0.3 * repeats as f32;
                if score > best_score {
                    best_score = score;
                    best_index = index;
                }
            }

            let chosen = deduped.swap_remove(best_index);
            *doc_counts.entry(chosen.document_id).or_insert(0) += 1;
            selected.push(chosen);
        }

        selected
    }

    fn dedup_key(&self, result: &SearchResult) -> String {
        let prefix: String = result
            .content
            .chars()
            .take(self.config.dedup_prefix_chars)
            .collect();
        let mut hasher = Sha256::new();
        hasher.update(result.document_id.as_bytes());
        hasher.update(prefix.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Compress a context string to fit `max_tokens` (estimated as chars/4).
    ///
    /// Under budget returns the context unchanged. Over budget, the chat
    /// provider summarizes while preserving facts and citation markers; on
    /// failure or cancellation the context is truncated with an ellipsis.
    pub async fn compress(
        &self,
        context: &str,
        max_tokens: usize,
        cancel: &CancelToken,
    ) -> String {
        let estimated = estimate_tokens(context);
        if estimated <= max_tokens {
            return context.to_string();
        }

        tracing::debug!(
            "Context over budget ({} > {} tokens), compressing",
            estimated,
            max_tokens
        );

        if !cancel.is_cancelled() {
            let messages = vec![
                ChatMessage::system(PromptBuilder::compress_system_prompt(max_tokens)),
                ChatMessage::user(context.to_string()),
            ];
            let options = ChatOptions {
                temperature: Some(0.1),
                max_tokens: Some(max_tokens),
                cancel: Some(cancel.clone()),
                ..Default::default()
            };

            match self.chat.complete(&messages, &options).await {
                Ok(completion) if estimate_tokens(&completion.content) <= max_tokens => {
                    return completion.content;
                }
                Ok(_) => {
                    tracing::warn!("Compression summary still over budget, truncating");
                }
                Err(e) => {
                    tracing::warn!("Compression failed ({}), truncating", e);
                }
            }
        }

        truncate_to_tokens(context, max_tokens)
    }
}

/// Token estimate at roughly four characters per token
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Truncate text to a token budget at a character boundary, marking the cut
fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens.saturating_mul(4);
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// Heuristic quality: query term coverage plus a length signal, no provider
/// call
fn quality_score(query: &str, content: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let content_lower = content.to_lowercase();
    let terms: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|t| t.chars().count() >= 3)
        .collect();

    let coverage = if terms.is_empty() {
        0.0
    } else {
        terms.iter().filter(|t| content_lower.contains(**t)).count() as f32 / terms.len() as f32
    };

    let len = content.chars().count();
    let length_signal = if (200..=1200).contains(&len) { 0.5 } else { 0.2 };

    coverage * 0.5 + length_signal
}
