//! Embedding capability and the client that drives it.
//!
//! ## Core Types
//!
//! - [`EmbeddingProvider`] - Anything that turns text into a fixed-length vector
//! - [`EmbeddingClient`] - Batching, backpressure and dimension pinning on top of a provider
//! - [`BackpressureConfig`] / [`Throttle`] - Pacing between embedding batches
//!
//! ## Providers
//!
//! - [`HttpEmbeddingProvider`] - OpenAI-compatible HTTP endpoint (feature `http-embedder`)
//! - [`HashingEmbedder`] - Deterministic offline feature hashing
//!
//! ## Example
//!
//! ```ignore
//! use lexvec_core::embedding::{EmbeddingClient, HttpEmbeddingProvider};
//!
//! let provider = HttpEmbeddingProvider::new("http://localhost:8080/v1/embeddings", "all-MiniLM-L6-v2")?
//!     .with_normalization(true);
//! let client = EmbeddingClient::new(Arc::new(provider), &EngineConfig::default())?;
//!
//! let vectors = client.embed_many(&texts).await?;
//! ```

mod traits;

pub mod backpressure;
pub mod client;
pub mod hashing;
#[cfg(feature = "http-embedder")]
pub mod http;

pub use backpressure::{BackpressureConfig, Throttle};
pub use client::EmbeddingClient;
pub use hashing::HashingEmbedder;
#[cfg(feature = "http-embedder")]
pub use http::HttpEmbeddingProvider;
pub use traits::EmbeddingProvider;

/// Scales `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
