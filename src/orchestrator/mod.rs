//! Query orchestration: classify, retrieve, decide on web, verify, generate
//!
//! One pass per query:
//! classify -> retrieve (if relevant) -> web (if warranted) -> build evidence
//! -> build instruction -> verify -> execute -> extract citations.
//! The cancellation token is checked before every expensive stage and
//! short-circuits to the cancelled terminal outcome.

pub mod verify;

use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::config::RagConfig;
use crate::embeddings::EmbeddingGateway;
use crate::error::Result;
use crate::generation::{extract_citations, InstructionSpec, PromptBuilder};
use crate::metrics::PipelineMetrics;
use crate::providers::{
    ChatMessage, ChatOptions, ChatProvider, DocumentStoreProvider, EmbeddingProvider,
    VectorStoreProvider, WebSearchProvider,
};
use crate::retrieval::search::params_for_intent;
use crate::retrieval::{ContextSelector, HybridRetriever, IntentClassifier, QueryPreprocessor};
use crate::types::{
    EvidenceBundle, EvidenceItem, QueryIntent, QueryOutcome, QueryRequest, RagAnswer,
    SearchResult,
};

/// Confidence below which the router prefers to consult the web
const LOW_CONFIDENCE: f32 = 0.45;

/// Orchestrates the full RAG pipeline for one query at a time
pub struct QueryOrchestrator {
    classifier: IntentClassifier,
    preprocessor: QueryPreprocessor,
    retriever: HybridRetriever,
    selector: ContextSelector,
    chat: Arc<dyn ChatProvider>,
    document_store: Arc<dyn DocumentStoreProvider>,
    web: Option<Arc<dyn WebSearchProvider>>,
    config: RagConfig,
    metrics: Arc<PipelineMetrics>,
}

impl QueryOrchestrator {
    /// Assemble the pipeline from providers and configuration
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        document_store: Arc<dyn DocumentStoreProvider>,
        web: Option<Arc<dyn WebSearchProvider>>,
        config: RagConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let gateway = EmbeddingGateway::new(embedding);

        Self {
            classifier: IntentClassifier::new(
                chat.clone(),
                metrics.clone(),
                std::time::Duration::from_secs(config.llm.classify_timeout_secs),
            ),
            preprocessor: QueryPreprocessor::new(chat.clone()),
            retriever: HybridRetriever::new(
                vector_store,
                document_store.clone(),
                gateway,
                config.retrieval.clone(),
                config.embeddings.legacy_dimensions.clone(),
                metrics.clone(),
            ),
            selector: ContextSelector::new(chat.clone(), config.context.clone()),
            chat,
            document_store,
            web,
            config,
            metrics,
        }
    }

    /// Answer a query.
    ///
    /// Terminal states: `Completed` with the grounded answer, `Cancelled`
    /// when the token fired before generation, or a typed error.
    pub async fn answer(
        &self,
        request: &QueryRequest,
        cancel: &CancelToken,
    ) -> Result<QueryOutcome> {
        let start = Instant::now();

        if self.cancelled(cancel) {
            return Ok(QueryOutcome::Cancelled);
        }

        // CLASSIFY
        let intent = self.classifier.classify(&request.question).await;
        let has_documents = self.has_documents(request).await?;
        let is_relevant = intent.needs_context && has_documents;
        tracing::debug!(
            "Classified {:?} (confidence {:.2}), document-relevant: {}",
            intent.kind,
            intent.confidence,
            is_relevant
        );

        if self.cancelled(cancel) {
            return Ok(QueryOutcome::Cancelled);
        }

        // RETRIEVE_RAG
        let selected = if is_relevant {
            match self.retrieve(request, &intent, cancel).await {
                Ok(results) => results,
                Err(e) => {
                    if cancel.is_cancelled() {
                        self.metrics.record_cancelled_query();
                        return Ok(QueryOutcome::Cancelled);
                    }
                    return Err(e);
                }
            }
        } else {
            Vec::new()
        };

        if self.cancelled(cancel) {
            return Ok(QueryOutcome::Cancelled);
        }

        // WEB_SEARCH
        let rag_bundle = EvidenceBundle::new(
            selected.iter().cloned().map(EvidenceItem::RagChunk).collect(),
        );
        let web_passages = if self.should_use_web(&intent, is_relevant, &rag_bundle) {
            self.search_web(&request.question).await
        } else {
            Vec::new()
        };

        if self.cancelled(cancel) {
            return Ok(QueryOutcome::Cancelled);
        }

        // BUILD_EVIDENCE
        let max_tokens = request
            .max_context_tokens
            .unwrap_or(self.config.context.max_context_tokens);
        let bundle = self
            .build_evidence(selected, web_passages, max_tokens, cancel)
            .await;
        let used_web = bundle.web_count() > 0;

        // BUILD_INSTRUCTION
        let spec = InstructionSpec::from_intent(
            &intent,
            !bundle.items.is_empty(),
            self.config.llm.max_completion_tokens,
        );

        // VERIFY (advisory)
        let verification = verify::verify_evidence(&bundle, &intent, spec.require_citations);
        if !verification.is_valid {
            tracing::warn!("Verification warnings: {:?}", verification.errors);
        }

        if self.cancelled(cancel) {
            return Ok(QueryOutcome::Cancelled);
        }

        // EXECUTE
        let context = PromptBuilder::build_context(&bundle);
        let messages = vec![
            ChatMessage::system(PromptBuilder::build_system_prompt(&spec)),
            ChatMessage::user(PromptBuilder::build_user_prompt(&request.question, &context)),
        ];
        let options = ChatOptions {
            temperature: Some(spec.temperature()),
            max_tokens: Some(spec.max_tokens),
            cancel: Some(cancel.clone()),
            ..Default::default()
        };

        let completion = match self.chat.complete(&messages, &options).await {
            Ok(completion) => completion,
            Err(e) => {
                if cancel.is_cancelled() {
                    self.metrics.record_cancelled_query();
                    return Ok(QueryOutcome::Cancelled);
                }
                // Degrade to the smaller fallback model before giving up
                tracing::warn!(
                    "Primary model failed ({}), retrying with {}",
                    e,
                    self.config.llm.fallback_model
                );
                self.metrics.record_model_fallback();
                let fallback_options = ChatOptions {
                    model: Some(self.config.llm.fallback_model.clone()),
                    ..options.clone()
                };
                match self.chat.complete(&messages, &fallback_options).await {
                    Ok(completion) => completion,
                    Err(e) => {
                        if cancel.is_cancelled() {
                            self.metrics.record_cancelled_query();
                            return Ok(QueryOutcome::Cancelled);
                        }
                        return Err(e);
                    }
                }
            }
        };

        // EXTRACT_CITATIONS
        let citations = extract_citations(&completion.content, &bundle);
        let similarities: Vec<f32> = citations
            .iter()
            .filter_map(|c| c.similarity_score)
            .collect();
        let confidence = if similarities.is_empty() {
            0.0
        } else {
            similarities.iter().sum::<f32>() / similarities.len() as f32
        };

        let processing_time_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_stage("answer", start.elapsed());

        tracing::info!(
            "Query completed in {}ms: {} evidence items, {} citations, web: {}",
            processing_time_ms,
            bundle.items.len(),
            citations.len(),
            used_web
        );

        Ok(QueryOutcome::Completed(RagAnswer {
            content: completion.content,
            citations,
            confidence,
            verification,
            used_web,
            evidence_tokens: bundle.total_tokens,
            processing_time_ms,
        }))
    }

    fn cancelled(&self, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            self.metrics.record_cancelled_query();
            tracing::info!("Query cancelled");
            return true;
        }
        false
    }

    async fn has_documents(&self, request: &QueryRequest) -> Result<bool> {
        if let Some(filter) = &request.document_filter {
            return Ok(!filter.is_empty());
        }
        Ok(!self
            .document_store
            .list_documents(request.user_id)
            .await?
            .is_empty())
    }

    /// Preprocess the query per the retrieval plan, search, and select
    async fn retrieve(
        &self,
        request: &QueryRequest,
        intent: &QueryIntent,
        cancel: &CancelToken,
    ) -> Result<Vec<SearchResult>> {
        let mut plan = params_for_intent(intent, &self.config.retrieval);
        plan.options.limit = plan.options.limit.max(request.top_k);
        plan.options.document_filter = request.document_filter.clone();

        let effective_query = if plan.use_rewriting {
            self.preprocessor.rewrite(&request.question, cancel).await
        } else {
            request.question.clone()
        };
        if plan.use_expansion {
            plan.options.variants = self.preprocessor.expand(&effective_query, cancel).await;
        }

        let results = self
            .retriever
            .search(&effective_query, request.user_id, &plan.options)
            .await?;

        Ok(self
            .selector
            .select(results, &request.question, plan.options.limit))
    }

    /// Web is consulted when the query is document-irrelevant, router
    /// confidence is low, or document coverage falls under the task's floor.
    fn should_use_web(
        &self,
        intent: &QueryIntent,
        is_relevant: bool,
        rag_bundle: &EvidenceBundle,
    ) -> bool {
        if self.web.is_none() || !self.config.web.enabled {
            return false;
        }
        if !is_relevant {
            return true;
        }
        if intent.confidence < LOW_CONFIDENCE {
            return true;
        }
        verify::coverage_score(rag_bundle) < verify::coverage_floor(intent)
    }

    /// Web search failure degrades to an empty passage list, never a query
    /// failure
    async fn search_web(&self, question: &str) -> Vec<crate::providers::WebPassage> {
        let Some(web) = &self.web else {
            return Vec::new();
        };

        match web.search(question).await {
            Ok(response) => {
                let mut passages = response.passages;
                passages.truncate(self.config.web.max_results);
                tracing::debug!("Web search returned {} passages", passages.len());
                passages
            }
            Err(e) => {
                tracing::warn!("Web search failed, continuing without it: {}", e);
                Vec::new()
            }
        }
    }

    /// Merge document and web evidence under the token budget.
    ///
    /// Documents get their configured share of the budget; a first document
    /// item that alone overflows the share is compressed rather than dropped.
    async fn build_evidence(
        &self,
        selected: Vec<SearchResult>,
        web_passages: Vec<crate::providers::WebPassage>,
        max_tokens: usize,
        cancel: &CancelToken,
    ) -> EvidenceBundle {
        let doc_budget =
            (max_tokens as f32 * self.config.context.document_share) as usize;

        let mut items: Vec<EvidenceItem> = Vec::new();
        let mut doc_tokens = 0usize;

        for result in selected {
            let item = EvidenceItem::RagChunk(result);
            let tokens = item.estimated_tokens();

            if doc_tokens + tokens > doc_budget {
                if items.is_empty() {
                    // Nothing packed yet: compress instead of returning
                    // an empty document context
                    if let EvidenceItem::RagChunk(mut result) = item {
                        result.content = self
                            .selector
                            .compress(&result.content, doc_budget, cancel)
                            .await;
                        let item = EvidenceItem::RagChunk(result);
                        doc_tokens += item.estimated_tokens();
                        items.push(item);
                    }
                }
                break;
            }

            doc_tokens += tokens;
            items.push(item);
        }

        let mut total_tokens = doc_tokens;
        for passage in web_passages {
            let item = EvidenceItem::WebResult(passage);
            let tokens = item.estimated_tokens();
            if total_tokens + tokens > max_tokens {
                break;
            }
            total_tokens += tokens;
            items.push(item);
        }

        EvidenceBundle::new(items)
    }

    /// Vector store scope of this orchestrator's user documents, exposed for
    /// host applications that want a cheap relevance probe
    pub async fn user_has_documents(&self, user_id: Uuid) -> Result<bool> {
        Ok(!self.document_store.list_documents(user_id).await?.is_empty())
    }
}
