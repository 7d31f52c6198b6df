//! Text chunking for retrieval-sized units

mod chunker;

pub use chunker::{AdaptiveChunker, ChunkStrategy, TextProfile};
