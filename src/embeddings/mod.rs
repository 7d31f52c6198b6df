//! Embedding generation with shape validation

mod gateway;

pub use gateway::EmbeddingGateway;
