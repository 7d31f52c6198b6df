//! Prompt templates for the RAG pipeline

use crate::types::{EvidenceBundle, EvidenceItem, IntentKind, QueryIntent};

/// Instruction parameters assembled per query from the classified intent
#[derive(Debug, Clone)]
pub struct InstructionSpec {
    /// Short task label, e.g. "factual"
    pub task_label: String,
    /// Precision need in [0, 1]
    pub precision: f32,
    /// Creativity need in [0, 1]
    pub creativity: f32,
    /// Whether every claim must carry a citation marker
    pub require_citations: bool,
    /// Maximum completion tokens
    pub max_tokens: usize,
}

impl InstructionSpec {
    /// Derive instruction parameters from a classified intent
    pub fn from_intent(intent: &QueryIntent, has_evidence: bool, max_tokens: usize) -> Self {
        let (precision, creativity) = match intent.kind {
            IntentKind::Factual => (0.9, 0.1),
            IntentKind::Analytical => (0.8, 0.3),
            IntentKind::Creative => (0.3, 0.9),
            IntentKind::Comparative => (0.8, 0.2),
            IntentKind::Procedural => (0.9, 0.1),
            IntentKind::Summarization => (0.7, 0.4),
        };

        Self {
            task_label: format!("{:?}", intent.kind).to_lowercase(),
            precision,
            creativity,
            require_citations: has_evidence,
            max_tokens,
        }
    }

    /// Generation temperature scaled to the creativity need
    pub fn temperature(&self) -> f32 {
        0.1 + 0.8 * self.creativity
    }
}

/// Prompt builder for all generative calls in the pipeline
pub struct PromptBuilder;

impl PromptBuilder {
    /// Numbered context from an evidence bundle; reference `[n]` is the nth
    /// item
    pub fn build_context(bundle: &EvidenceBundle) -> String {
        let mut context = String::new();

        for (i, item) in bundle.items.iter().enumerate() {
            let source_ref = match item {
                EvidenceItem::RagChunk(result) => result.document_title.clone(),
                EvidenceItem::WebResult(passage) => {
                    format!("{} ({})", passage.title, passage.url)
                }
            };

            context.push_str(&format!(
                "[{}] {}\n\n{}\n\n---\n\n",
                i + 1,
                source_ref,
                item.content()
            ));
        }

        context
    }

    /// System prompt for grounded answer generation
    pub fn build_system_prompt(spec: &InstructionSpec) -> String {
        let citation_rule = if spec.require_citations {
            "Every fact or claim MUST cite its source with a bracketed reference like [1] or [2], \
             matching the numbered context below. Do not invent references."
        } else {
            "No document context is available; answer from general knowledge and say so."
        };

        let precision_rule = if spec.precision >= 0.8 {
            "Be precise: state only what the context supports, no speculation."
        } else {
            "Favor a helpful, well-organized answer."
        };

        format!(
            "You are a document-grounded assistant handling a {} task.\n\
             Only use information from the provided context when it is available; \
             if the answer is not in the context, say so rather than guessing.\n\
             {}\n{}\n\
             Keep the answer under {} tokens.",
            spec.task_label, precision_rule, citation_rule, spec.max_tokens
        )
    }

    /// User prompt combining the question with the numbered context
    pub fn build_user_prompt(question: &str, context: &str) -> String {
        if context.is_empty() {
            return question.to_string();
        }
        format!(
            "CONTEXT:\n{}\nQUESTION: {}\n\nAnswer using the context above, citing references like [1]:",
            context, question
        )
    }

    /// System prompt for query rewriting
    pub fn rewrite_system_prompt() -> &'static str {
        "Rewrite the user's search query to be clearer and more specific for \
         document retrieval. Keep the meaning identical. Reply with the \
         rewritten query only, no explanation."
    }

    /// System prompt for query expansion
    pub fn expand_system_prompt() -> &'static str {
        "Produce two alternative phrasings of the user's search query, each \
         semantically equivalent to the original. Reply with one phrasing per \
         line and nothing else."
    }

    /// System prompt for intent classification
    pub fn classify_system_prompt() -> &'static str {
        r#"Classify the user's query. Reply with ONLY a JSON object, no prose:
{"type": "factual|analytical|creative|comparative|procedural|summarization", "confidence": 0.0-1.0, "strategy": "semantic|hybrid|keyword", "limit": 1-20, "needs_context": true|false}
"needs_context" is whether answering requires the user's own documents."#
    }

    /// System prompt for context compression
    pub fn compress_system_prompt(max_tokens: usize) -> String {
        format!(
            "Condense the following context to at most {} tokens. Preserve all \
             facts, numbers, and bracketed citation markers like [1] exactly. \
             Reply with the condensed context only.",
            max_tokens
        )
    }
}
