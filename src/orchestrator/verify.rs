//! Advisory grounding verification
//!
//! Verification never blocks the pipeline; a failing report is logged and
//! carried on the answer as a warning.

use crate::types::{EvidenceBundle, QueryIntent, VerificationReport};

/// Distinct source documents treated as full coverage
const FULL_COVERAGE_DOCS: f32 = 3.0;

/// Coverage floor for ordinary tasks
const COVERAGE_FLOOR: f32 = 0.5;

/// More lenient floor for writing tasks
const WRITE_COVERAGE_FLOOR: f32 = 0.25;

/// Coverage of an evidence bundle: distinct source documents against the
/// full-coverage constant, boosted by web results.
pub fn coverage_score(bundle: &EvidenceBundle) -> f32 {
    let base = (bundle.distinct_documents() as f32 / FULL_COVERAGE_DOCS).min(1.0);
    let web_boost = 0.1 * bundle.web_count().min(3) as f32;
    (base + web_boost).min(1.0)
}

/// Coverage floor for the given intent
pub fn coverage_floor(intent: &QueryIntent) -> f32 {
    if intent.kind.is_write_task() {
        WRITE_COVERAGE_FLOOR
    } else {
        COVERAGE_FLOOR
    }
}

/// Check the evidence against the task's citation/coverage requirements
pub fn verify_evidence(
    bundle: &EvidenceBundle,
    intent: &QueryIntent,
    require_citations: bool,
) -> VerificationReport {
    let mut errors = Vec::new();

    if require_citations && bundle.items.is_empty() {
        errors.push("citations required but no evidence was gathered".to_string());
    }

    if !bundle.items.is_empty() {
        let coverage = coverage_score(bundle);
        let floor = coverage_floor(intent);
        if coverage < floor {
            errors.push(format!(
                "evidence coverage {:.2} below the {:.2} floor for {:?} tasks",
                coverage, floor, intent.kind
            ));
        }
    }

    VerificationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}
