//! Gateway wrapping the embedding provider with shape validation

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

/// Wraps an [`EmbeddingProvider`] and validates every returned vector.
///
/// A vector of the wrong length, a non-finite entry, or a batch whose count
/// does not match the input count is a hard failure for the operation being
/// processed; errors carry the input's size and a bounded preview only.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
}

impl EmbeddingGateway {
    /// Create a gateway enforcing the provider's configured dimension
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let dimensions = provider.dimensions();
        Self { provider, dimensions }
    }

    /// The enforced embedding dimension
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed a single text, validating the returned vector's shape
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.provider.embed(text).await?;
        self.validate(&vector, text)?;
        Ok(vector)
    }

    /// Embed a batch, validating the count and every vector's shape
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.provider.embed_batch(texts).await?;

        if vectors.len() != texts.len() {
            return Err(Error::embedding(format!(
                "batch count mismatch: {} inputs, {} vectors returned",
                texts.len(),
                vectors.len()
            )));
        }

        for (vector, text) in vectors.iter().zip(texts) {
            self.validate(vector, text)?;
        }

        Ok(vectors)
    }

    fn validate(&self, vector: &[f32], input: &str) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::embedding_shape(self.dimensions, vector.len(), input));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::embedding(format!(
                "vector contains non-finite entries (input {} chars)",
                input.chars().count()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedEmbedder {
        vector: Vec<f32>,
        batch_short: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.vector.clone())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let count = if self.batch_short {
                texts.len().saturating_sub(1)
            } else {
                texts.len()
            };
            Ok(vec![self.vector.clone(); count])
        }

        fn dimensions(&self) -> usize {
            4
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn accepts_well_shaped_vectors() {
        let gateway = EmbeddingGateway::new(Arc::new(FixedEmbedder {
            vector: vec![0.1, 0.2, 0.3, 0.4],
            batch_short: false,
        }));

        let vector = gateway.embed("hello").await.unwrap();
        assert_eq!(vector.len(), 4);

        let batch = gateway
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        // Provider claims 4 dims but returns 2
        let gateway = EmbeddingGateway::new(Arc::new(FixedEmbedder {
            vector: vec![0.1, 0.2],
            batch_short: false,
        }));

        let err = gateway.embed("some input text").await.unwrap_err();
        match err {
            Error::EmbeddingShape { expected, actual, .. } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("expected EmbeddingShape, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_nan_entries() {
        let gateway = EmbeddingGateway::new(Arc::new(FixedEmbedder {
            vector: vec![0.1, f32::NAN, 0.3, 0.4],
            batch_short: false,
        }));

        assert!(gateway.embed("hello").await.is_err());
    }

    #[tokio::test]
    async fn rejects_batch_count_mismatch() {
        let gateway = EmbeddingGateway::new(Arc::new(FixedEmbedder {
            vector: vec![0.1, 0.2, 0.3, 0.4],
            batch_short: true,
        }));

        let err = gateway
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let gateway = EmbeddingGateway::new(Arc::new(FixedEmbedder {
            vector: vec![0.1, 0.2, 0.3, 0.4],
            batch_short: false,
        }));

        assert!(gateway.embed_batch(&[]).await.unwrap().is_empty());
    }
}
