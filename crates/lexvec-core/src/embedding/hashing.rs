//! Offline feature-hashing embedder.
//!
//! Produces deterministic vectors without any model: each lower-cased term is
//! hashed (FNV-1a) into one of `D` buckets with a hash-derived sign, counts
//! are accumulated and the result is L2-normalised. Texts sharing vocabulary
//! land close together; there is no semantic generalisation beyond that.
//!
//! Useful for air-gapped machines, smoke tests and the CLI's `--offline`
//! mode.

use super::l2_normalize;
use super::traits::EmbeddingProvider;
use crate::error::EmbeddingError;
use async_trait::async_trait;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic hashing embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "hashing embedder dimension must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            model_id: format!("hashing-fnv1a-{}", dimension),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    /// Embeds synchronously; the trait methods delegate here.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for term in Self::terms(text) {
            let hash = fnv1a(term.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            // Top bit picks the sign so collisions tend to cancel
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
