//! Query rewriting and expansion
//!
//! Cheap heuristics gate the generative calls so short or already-direct
//! queries never hit the provider.

use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::generation::PromptBuilder;
use crate::providers::{ChatMessage, ChatOptions, ChatProvider};

const QUESTION_WORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "could", "would", "should",
    "is", "are", "do", "does",
];

/// Rewrites and expands raw queries into retrieval-optimized variants
pub struct QueryPreprocessor {
    chat: Arc<dyn ChatProvider>,
}

impl QueryPreprocessor {
    /// Create a preprocessor backed by the given chat provider
    pub fn new(chat: Arc<dyn ChatProvider>) -> Self {
        Self { chat }
    }

    /// Whether a query is worth a generative rewrite.
    ///
    /// Requires a multi-word query that is long enough and not already a
    /// direct question.
    pub fn should_preprocess(query: &str) -> bool {
        let query = query.trim();
        if query.chars().count() < 20 {
            return false;
        }
        let words: Vec<&str> = query.split_whitespace().collect();
        if words.len() < 3 {
            return false;
        }
        if query.ends_with('?') {
            return false;
        }
        if let Some(first) = words.first() {
            if QUESTION_WORDS.contains(&first.to_lowercase().as_str()) {
                return false;
            }
        }
        true
    }

    /// Rewrite a query for retrieval.
    ///
    /// The generative rewrite is accepted only when its length stays within
    /// [0.7x, 2x] of the original; otherwise the original is kept. Skipped
    /// queries and cancellation return the original unchanged.
    pub async fn rewrite(&self, query: &str, cancel: &CancelToken) -> String {
        if !Self::should_preprocess(query) || cancel.is_cancelled() {
            return query.to_string();
        }

        let messages = vec![
            ChatMessage::system(PromptBuilder::rewrite_system_prompt()),
            ChatMessage::user(query.to_string()),
        ];
        let options = ChatOptions {
            temperature: Some(0.2),
            max_tokens: Some(120),
            cancel: Some(cancel.clone()),
            ..Default::default()
        };

        match self.chat.complete(&messages, &options).await {
            Ok(completion) => {
                let rewritten = completion.content.trim().trim_matches('"').to_string();
                let original_len = query.chars().count() as f32;
                let rewritten_len = rewritten.chars().count() as f32;

                if rewritten_len >= original_len * 0.7 && rewritten_len <= original_len * 2.0 {
                    tracing::debug!("Rewrote query: {:?} -> {:?}", query, rewritten);
                    rewritten
                } else {
                    tracing::debug!(
                        "Discarded rewrite outside length window ({} -> {} chars)",
                        original_len,
                        rewritten_len
                    );
                    query.to_string()
                }
            }
            Err(e) => {
                tracing::warn!("Query rewrite failed, keeping original: {}", e);
                query.to_string()
            }
        }
    }

    /// Expand a query into up to two additional phrasings.
    ///
    /// The original query is always the first element. Malformed or too-long
    /// alternates are discarded; gating and failures leave only the original.
    pub async fn expand(&self, query: &str, cancel: &CancelToken) -> Vec<String> {
        let mut variants = vec![query.to_string()];

        if !Self::should_preprocess(query) || cancel.is_cancelled() {
            return variants;
        }

        let messages = vec![
            ChatMessage::system(PromptBuilder::expand_system_prompt()),
            ChatMessage::user(query.to_string()),
        ];
        let options = ChatOptions {
            temperature: Some(0.5),
            max_tokens: Some(160),
            cancel: Some(cancel.clone()),
            ..Default::default()
        };

        match self.chat.complete(&messages, &options).await {
            Ok(completion) => {
                let max_len = query.chars().count() * 2;
                for line in completion.content.lines() {
                    if variants.len() >= 3 {
                        break;
                    }
                    let alternate = line
                        .trim()
                        .trim_start_matches(['-', '*', '1', '2', '.', ')'])
                        .trim()
                        .trim_matches('"')
                        .to_string();

                    if alternate.is_empty()
                        || alternate.chars().count() > max_len.max(40)
                        || variants.iter().any(|v| v.eq_ignore_ascii_case(&alternate))
                    {
                        continue;
                    }
                    variants.push(alternate);
                }
            }
            Err(e) => {
                tracing::warn!("Query expansion failed, using original only: {}", e);
            }
        }

        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::providers::chat::ChatCompletion;
    use async_trait::async_trait;

    struct ScriptedChat {
        reply: String,
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<ChatCompletion> {
            Ok(ChatCompletion {
                content: self.reply.clone(),
                usage: Default::default(),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    #[test]
    fn gating_skips_short_and_direct_queries() {
        assert!(!QueryPreprocessor::should_preprocess("rust"));
        assert!(!QueryPreprocessor::should_preprocess("what is the capital of France?"));
        assert!(!QueryPreprocessor::should_preprocess(
            "how does incremental vectorization work"
        ));
        assert!(QueryPreprocessor::should_preprocess(
            "notes from the march planning meeting about budget"
        ));
    }

    #[tokio::test]
    async fn rewrite_outside_length_window_keeps_original() {
        let query = "notes from the march planning meeting about budget";
        let preprocessor = QueryPreprocessor::new(Arc::new(ScriptedChat {
            reply: "x".repeat(500),
        }));

        let rewritten = preprocessor.rewrite(query, &CancelToken::new()).await;
        assert_eq!(rewritten, query);
    }

    #[tokio::test]
    async fn rewrite_within_window_is_accepted() {
        let query = "notes from the march planning meeting about budget";
        let reply = "march planning meeting notes budget allocation summary";
        let preprocessor = QueryPreprocessor::new(Arc::new(ScriptedChat {
            reply: reply.to_string(),
        }));

        let rewritten = preprocessor.rewrite(query, &CancelToken::new()).await;
        assert_eq!(rewritten, reply);
    }

    #[tokio::test]
    async fn expand_caps_at_two_alternates() {
        let query = "notes from the march planning meeting about budget";
        let preprocessor = QueryPreprocessor::new(Arc::new(ScriptedChat {
            reply: "- march meeting budget notes\n- planning meeting budget summary\n- a third variant\n- a fourth variant".to_string(),
        }));

        let variants = preprocessor.expand(query, &CancelToken::new()).await;
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[0], query);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_to_original() {
        let query = "notes from the march planning meeting about budget";
        let preprocessor = QueryPreprocessor::new(Arc::new(ScriptedChat {
            reply: "should never be used".to_string(),
        }));

        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(preprocessor.rewrite(query, &cancel).await, query);
        assert_eq!(preprocessor.expand(query, &cancel).await, vec![query.to_string()]);
    }
}
