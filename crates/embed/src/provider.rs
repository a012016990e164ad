use crate::error::Result;
use async_trait::async_trait;

/// Embedding provider boundary: text in, fixed-dimension vectors out.
///
/// Implementations own their transport, timeout and retry behavior; callers
/// only see vectors or a classified error.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector dimensionality this provider produces.
    fn dimension(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors.pop().ok_or(crate::EmbedError::EmptyResponse)
    }
}
