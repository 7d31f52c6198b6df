//! Intent classification with parse-or-repair output handling
//!
//! Classification never fails: malformed model output goes through a JSON
//! parse, then regex field salvage, then the hard-coded fallback intent.

use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::generation::PromptBuilder;
use crate::metrics::PipelineMetrics;
use crate::providers::{ChatMessage, ChatOptions, ChatProvider};
use crate::types::{IntentKind, QueryIntent, RetrievalStrategy};

/// Partially parsed classifier output; every field is optional so one bad
/// field cannot sink the rest.
#[derive(Debug, Default, Deserialize)]
struct RawIntent {
    #[serde(rename = "type")]
    kind: Option<String>,
    confidence: Option<f32>,
    strategy: Option<String>,
    limit: Option<usize>,
    needs_context: Option<bool>,
}

impl RawIntent {
    fn into_intent(self) -> QueryIntent {
        let fallback = QueryIntent::fallback();
        QueryIntent {
            kind: self
                .kind
                .as_deref()
                .and_then(IntentKind::parse)
                .unwrap_or(fallback.kind),
            confidence: self
                .confidence
                .filter(|c| (0.0..=1.0).contains(c))
                .unwrap_or(fallback.confidence),
            strategy: self
                .strategy
                .as_deref()
                .and_then(RetrievalStrategy::parse)
                .unwrap_or(fallback.strategy),
            suggested_limit: self
                .limit
                .filter(|l| (1..=50).contains(l))
                .unwrap_or(fallback.suggested_limit),
            needs_context: self.needs_context.unwrap_or(fallback.needs_context),
        }
    }
}

/// Labels a query and recommends retrieval parameters
pub struct IntentClassifier {
    chat: Arc<dyn ChatProvider>,
    metrics: Arc<PipelineMetrics>,
    classify_timeout: Duration,
}

impl IntentClassifier {
    /// Create a classifier with a hard per-call timeout
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        metrics: Arc<PipelineMetrics>,
        classify_timeout: Duration,
    ) -> Self {
        Self {
            chat,
            metrics,
            classify_timeout,
        }
    }

    /// Classify a query.
    ///
    /// Always returns a structurally valid intent; provider errors, hangs,
    /// and malformed output all resolve to the fallback.
    pub async fn classify(&self, query: &str) -> QueryIntent {
        let messages = vec![
            ChatMessage::system(PromptBuilder::classify_system_prompt()),
            ChatMessage::user(query.to_string()),
        ];
        let options = ChatOptions {
            temperature: Some(0.0),
            max_tokens: Some(120),
            ..Default::default()
        };

        let completion = match timeout(
            self.classify_timeout,
            self.chat.complete(&messages, &options),
        )
        .await
        {
            Ok(Ok(completion)) => completion,
            Ok(Err(e)) => {
                tracing::warn!("Intent classification failed, using fallback: {}", e);
                self.metrics.record_classifier_fallback();
                return QueryIntent::fallback();
            }
            Err(_) => {
                tracing::warn!(
                    "Intent classification timed out after {:?}, using fallback",
                    self.classify_timeout
                );
                self.metrics.record_classifier_fallback();
                return QueryIntent::fallback();
            }
        };

        match parse_intent(&completion.content) {
            Some(intent) => intent,
            None => {
                tracing::warn!(
                    "Unparseable classifier output ({} chars), using fallback",
                    completion.content.chars().count()
                );
                self.metrics.record_classifier_fallback();
                QueryIntent::fallback()
            }
        }
    }
}

/// Parse classifier output: JSON first, then regex field salvage.
///
/// Returns None only when neither stage recovers a single field.
fn parse_intent(output: &str) -> Option<QueryIntent> {
    // Stage 1: locate and parse a JSON object (models often wrap it in prose
    // or code fences)
    if let Some(start) = output.find('{') {
        if let Some(end) = output.rfind('}') {
            if end > start {
                if let Ok(raw) = serde_json::from_str::<RawIntent>(&output[start..=end]) {
                    return Some(raw.into_intent());
                }
            }
        }
    }

    // Stage 2: regex salvage of individual fields
    let kind_re = Regex::new(r#""?type"?\s*[:=]\s*"?(\w+)"#).ok()?;
    let confidence_re = Regex::new(r#""?confidence"?\s*[:=]\s*([0-9]*\.?[0-9]+)"#).ok()?;
    let strategy_re = Regex::new(r#""?strategy"?\s*[:=]\s*"?(\w+)"#).ok()?;
    let limit_re = Regex::new(r#""?limit"?\s*[:=]\s*([0-9]+)"#).ok()?;
    let context_re = Regex::new(r#""?needs_context"?\s*[:=]\s*(true|false)"#).ok()?;

    let raw = RawIntent {
        kind: kind_re
            .captures(output)
            .map(|c| c[1].to_string()),
        confidence: confidence_re
            .captures(output)
            .and_then(|c| c[1].parse().ok()),
        strategy: strategy_re
            .captures(output)
            .map(|c| c[1].to_string()),
        limit: limit_re.captures(output).and_then(|c| c[1].parse().ok()),
        needs_context: context_re
            .captures(output)
            .map(|c| &c[1] == "true"),
    };

    let salvaged_anything = raw.kind.is_some()
        || raw.confidence.is_some()
        || raw.strategy.is_some()
        || raw.limit.is_some()
        || raw.needs_context.is_some();

    if salvaged_anything {
        Some(raw.into_intent())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::providers::chat::ChatCompletion;
    use async_trait::async_trait;

    struct ScriptedChat {
        reply: Result<String>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<ChatCompletion> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(content) => Ok(ChatCompletion {
                    content: content.clone(),
                    usage: Default::default(),
                }),
                Err(_) => Err(Error::llm("scripted failure")),
            }
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

    fn classifier(reply: Result<String>, delay: Option<Duration>) -> IntentClassifier {
        IntentClassifier::new(
            Arc::new(ScriptedChat { reply, delay }),
            Arc::new(PipelineMetrics::default()),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn parses_well_formed_json() {
        let classifier = classifier(
            Ok(r#"{"type": "comparative", "confidence": 0.9, "strategy": "semantic", "limit": 8, "needs_context": true}"#.to_string()),
            None,
        );

        let intent = classifier.classify("compare the two proposals").await;
        assert_eq!(intent.kind, IntentKind::Comparative);
        assert_eq!(intent.strategy, RetrievalStrategy::Semantic);
        assert_eq!(intent.suggested_limit, 8);
        assert!((intent.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn salvages_fields_from_prose() {
        let classifier = classifier(
            Ok("Sure! The type: \"procedural\" with confidence: 0.8 and strategy: keyword seems right.".to_string()),
            None,
        );

        let intent = classifier.classify("how do I deploy").await;
        assert_eq!(intent.kind, IntentKind::Procedural);
        assert_eq!(intent.strategy, RetrievalStrategy::Keyword);
        // Unsalvaged fields fall back to defaults
        assert_eq!(intent.suggested_limit, 5);
    }

    #[tokio::test]
    async fn provider_error_returns_fallback() {
        let classifier = classifier(Err(Error::llm("down")), None);

        let intent = classifier.classify("anything").await;
        assert_eq!(intent.kind, IntentKind::Factual);
        assert!((intent.confidence - 0.5).abs() < 1e-6);
        assert_eq!(intent.strategy, RetrievalStrategy::Hybrid);
    }

    #[tokio::test]
    async fn timeout_returns_fallback() {
        let classifier = classifier(
            Ok("{\"type\": \"factual\"}".to_string()),
            Some(Duration::from_secs(5)),
        );

        let intent = classifier.classify("anything").await;
        assert_eq!(intent.kind, IntentKind::Factual);
        assert_eq!(intent.suggested_limit, 5);
    }

    #[tokio::test]
    async fn garbage_output_returns_fallback() {
        let classifier = classifier(Ok("complete nonsense with no fields at all".to_string()), None);

        let intent = classifier.classify("anything").await;
        assert_eq!(intent.kind, IntentKind::Factual);
        assert!(intent.needs_context);
    }

    #[test]
    fn out_of_range_fields_are_clamped_to_defaults() {
        let intent = parse_intent(r#"{"type": "factual", "confidence": 7.5, "limit": 900}"#).unwrap();
        assert!((intent.confidence - 0.5).abs() < 1e-6);
        assert_eq!(intent.suggested_limit, 5);
    }
}
