//! Pipeline metrics with a bounded ring buffer
//!
//! Constructed explicitly and injected where needed; holders share one
//! instance through `Arc<PipelineMetrics>`.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// A recorded pipeline stage timing
#[derive(Debug, Clone)]
pub struct StageTiming {
    /// Stage name, e.g. "retrieve_rag" or "vectorize"
    pub stage: String,
    /// Wall-clock duration of the stage
    pub duration: Duration,
    /// When the stage completed
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Counters {
    vector_store_fallbacks: u64,
    model_fallbacks: u64,
    classifier_fallbacks: u64,
    cancelled_queries: u64,
}

/// Metrics service for the RAG pipeline.
///
/// Timings are kept in a ring buffer capped at `capacity`; counters are
/// monotonic for the lifetime of the instance.
pub struct PipelineMetrics {
    timings: RwLock<VecDeque<StageTiming>>,
    counters: RwLock<Counters>,
    capacity: usize,
}

impl PipelineMetrics {
    /// Create a metrics service retaining at most `capacity` timings
    pub fn new(capacity: usize) -> Self {
        Self {
            timings: RwLock::new(VecDeque::with_capacity(capacity)),
            counters: RwLock::new(Counters::default()),
            capacity: capacity.max(1),
        }
    }

    /// Record a stage timing, evicting the oldest entry at capacity
    pub fn record_stage(&self, stage: &str, duration: Duration) {
        let mut timings = self.timings.write();
        if timings.len() >= self.capacity {
            timings.pop_front();
        }
        timings.push_back(StageTiming {
            stage: stage.to_string(),
            duration,
            recorded_at: Utc::now(),
        });
    }

    /// Record a vector store failure that degraded to the keyword scan
    pub fn record_vector_store_fallback(&self) {
        self.counters.write().vector_store_fallbacks += 1;
    }

    /// Record a chat completion retried on the fallback model
    pub fn record_model_fallback(&self) {
        self.counters.write().model_fallbacks += 1;
    }

    /// Record an intent classification that fell back to the default
    pub fn record_classifier_fallback(&self) {
        self.counters.write().classifier_fallbacks += 1;
    }

    /// Record a query that terminated in the cancelled state
    pub fn record_cancelled_query(&self) {
        self.counters.write().cancelled_queries += 1;
    }

    /// Snapshot of recorded timings, oldest first
    pub fn timings(&self) -> Vec<StageTiming> {
        self.timings.read().iter().cloned().collect()
    }

    /// Number of vector store fallback events
    pub fn vector_store_fallbacks(&self) -> u64 {
        self.counters.read().vector_store_fallbacks
    }

    /// Number of model fallback events
    pub fn model_fallbacks(&self) -> u64 {
        self.counters.read().model_fallbacks
    }

    /// Number of classifier fallback events
    pub fn classifier_fallbacks(&self) -> u64 {
        self.counters.read().classifier_fallbacks
    }

    /// Number of cancelled queries
    pub fn cancelled_queries(&self) -> u64 {
        self.counters.read().cancelled_queries
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new(256)
    }
}
