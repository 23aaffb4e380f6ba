//! Embedding client adapter.
//!
//! Wraps an [`EmbeddingProvider`] with batching, backpressure and dimension
//! pinning. All embedding in the engine (bulk build, query, dimension probe)
//! goes through one [`EmbeddingClient`].

use super::backpressure::Throttle;
use super::traits::EmbeddingProvider;
use crate::config::{EngineConfig, DIMENSION_PROBE_TEXT};
use crate::error::EmbeddingError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Sentinel for "no dimension pinned yet".
const UNPINNED: usize = 0;

/// Batching, throttled front for an embedding provider.
///
/// The first vector this client sees pins the dimension `D`. Every later
/// vector must have the same length or the call fails with
/// [`EmbeddingError::DimensionChanged`]. Call [`reset`](Self::reset) after
/// deliberately switching models.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    throttle: Throttle,
    pinned_dimension: AtomicUsize,
}

impl EmbeddingClient {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        config: &EngineConfig,
    ) -> Result<Self, EmbeddingError> {
        if config.embed_batch_size == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "embed_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            provider,
            batch_size: config.embed_batch_size,
            throttle: Throttle::from_config(&config.backpressure)?,
            pinned_dimension: AtomicUsize::new(UNPINNED),
        })
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Dimension pinned by the first observed vector, if any.
    pub fn pinned_dimension(&self) -> Option<usize> {
        match self.pinned_dimension.load(Ordering::SeqCst) {
            UNPINNED => None,
            dimension => Some(dimension),
        }
    }

    /// Forgets the pinned dimension.
    pub fn reset(&self) {
        self.pinned_dimension.store(UNPINNED, Ordering::SeqCst);
    }

    /// Embeds one text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self.provider.embed(text).await?;
        self.check_dimension(vector.len())?;
        Ok(vector)
    }

    /// Embeds many texts in sequential batches of `batch_size`.
    ///
    /// Output order matches input order. Any batch failure abandons the whole
    /// call and partial results are dropped.
    #[instrument(skip_all, fields(texts = texts.len(), batch_size = self.batch_size))]
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let start = Instant::now();
        let total = texts.len().div_ceil(self.batch_size);
        let mut vectors = Vec::with_capacity(texts.len());

        for (index, batch) in texts.chunks(self.batch_size).enumerate() {
            self.throttle.acquire(index).await;
            debug!("Embedding batch {}/{} ({} texts)", index + 1, total, batch.len());

            let embedded = self.provider.embed_batch(batch).await.map_err(|e| {
                EmbeddingError::BatchFailed {
                    batch: index + 1,
                    total,
                    reason: e.to_string(),
                }
            })?;

            if embedded.len() != batch.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "batch {}/{}: expected {} vectors, got {}",
                    index + 1,
                    total,
                    batch.len(),
                    embedded.len()
                )));
            }
            for vector in &embedded {
                self.check_dimension(vector.len())?;
            }
            vectors.extend(embedded);
        }

        info!(
            "Embedded {} texts in {} batches in {:.2}s",
            vectors.len(),
            total,
            start.elapsed().as_secs_f64()
        );
        Ok(vectors)
    }

    /// Embeds the fixed probe text and returns the live model's dimension.
    pub async fn probe_dimension(&self) -> Result<usize, EmbeddingError> {
        let probe = self.embed_one(DIMENSION_PROBE_TEXT).await?;
        debug!("Probed embedding dimension: {}", probe.len());
        Ok(probe.len())
    }

    fn check_dimension(&self, actual: usize) -> Result<(), EmbeddingError> {
        if actual == 0 {
            return Err(EmbeddingError::InvalidResponse(
                "provider returned an empty vector".to_string(),
            ));
        }
        match self.pinned_dimension.compare_exchange(
            UNPINNED,
            actual,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => Ok(()),
            Err(pinned) if pinned == actual => Ok(()),
            Err(pinned) => Err(EmbeddingError::DimensionChanged { pinned, actual }),
        }
    }
}
