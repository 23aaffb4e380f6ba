//! Trait for embedding capabilities.
//!
//! The engine never runs a model itself. Anything that turns text into a
//! fixed-length vector (a remote API, a local model server, the offline
//! hashing embedder) plugs in through [`EmbeddingProvider`].

use crate::error::EmbeddingError;
use async_trait::async_trait;

/// Source of dense text embeddings.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the embedding client is shared
/// between the build path and concurrent searches.
///
/// # Examples
///
/// ```ignore
/// let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(256)?);
/// let vector = provider.embed("hello").await?;
/// assert_eq!(vector.len(), 256);
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the model producing the vectors, recorded in manifests.
    fn model_id(&self) -> &str;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}
