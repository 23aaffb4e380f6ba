// Flat exact inner-product index

use super::types::{validate_dimension, Ordinal};
use crate::error::EngineError;
use std::cmp::Ordering;
use tracing::instrument;

/// Inner product of two equal-length vectors.
///
/// For unit-normalised embeddings this equals cosine similarity.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}

/// Exact similarity index over a fixed set of vectors.
///
/// Vectors live in one contiguous row-major buffer; row `i` belongs to
/// `Ordinal(i)`. The index is built in one shot and never mutated; a rebuild
/// produces a new index.
///
/// Inputs are expected to be unit-normalised so the inner product behaves as
/// cosine similarity. This is not enforced.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    /// `rows * dimension` floats
    data: Vec<f32>,
    rows: usize,
    dimension: usize,
}

impl SimilarityIndex {
    /// Builds an index from `N` vectors of a common dimension.
    ///
    /// # Errors
    ///
    /// - `NoDocuments` if `vectors` is empty
    /// - `DimensionMismatch` if any row differs in length from the first
    /// - `InvalidInput` for zero-length vectors
    pub fn build<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Self, EngineError> {
        let first = vectors.first().ok_or(EngineError::NoDocuments)?;
        let dimension = first.as_ref().len();
        if dimension == 0 {
            return Err(EngineError::InvalidInput(
                "embedding vectors must not be empty".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for vector in vectors {
            let vector = vector.as_ref();
            validate_dimension(dimension, vector.len())?;
            data.extend_from_slice(vector);
        }

        Ok(Self {
            data,
            rows: vectors.len(),
            dimension,
        })
    }

    /// Number of indexed vectors.
    pub fn size(&self) -> usize {
        self.rows
    }

    /// Vector dimension, 0 until built.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_ready(&self) -> bool {
        self.rows > 0
    }

    /// Returns the `min(k, N)` most similar rows.
    ///
    /// Results are sorted by score descending with ties broken by ascending
    /// ordinal, so identical inputs always produce identical output.
    #[instrument(skip_all, fields(k, index_size = self.rows))]
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(Ordinal, f32)>, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotReady);
        }
        validate_dimension(self.dimension, vector.len())?;

        let k = k.min(self.rows);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(Ordinal, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, stored)| (Ordinal::from_index(row), inner_product(vector, stored)))
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);

        Ok(scored)
    }
}

/// Score descending, then ordinal ascending.
fn rank_order(a: &(Ordinal, f32), b: &(Ordinal, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}
