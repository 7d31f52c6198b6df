//! Core data types

pub mod document;
pub mod query;
pub mod response;

pub use document::{DocumentChange, DocumentChangeKind, DocumentChunk, DocumentVersion, StoredDocument};
pub use query::{IntentKind, QueryIntent, QueryRequest, RetrievalStrategy};
pub use response::{
    Citation, EvidenceBundle, EvidenceItem, QueryOutcome, RagAnswer, SearchResult,
    VectorizeReport, VerificationReport,
};
