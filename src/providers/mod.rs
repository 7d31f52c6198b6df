//! Provider abstractions for embeddings, chat, vector storage, document
//! storage, and web search
//!
//! All external collaborators sit behind these traits so the core can degrade
//! gracefully when one is unavailable and so tests can run without a network.

pub mod chat;
pub mod document_store;
pub mod duckduckgo;
pub mod embedding;
pub mod memory;
pub mod ollama;
pub mod vector_store;
pub mod web_search;

pub use chat::{ChatCompletion, ChatMessage, ChatOptions, ChatProvider, ChatUsage};
pub use document_store::DocumentStoreProvider;
pub use embedding::EmbeddingProvider;
pub use vector_store::{VectorMatch, VectorStoreProvider};
pub use web_search::{WebPassage, WebSearchProvider, WebSearchResponse};
