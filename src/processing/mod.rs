//! Incremental vectorization driven by content-change detection

pub mod change_tracker;
pub mod vectorizer;

pub use change_tracker::{diff_content, hash_content, needs_revectorization};
pub use vectorizer::IncrementalVectorizer;
