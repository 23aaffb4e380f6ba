//! Error types for lexvec-core.
//!
//! [`EngineError`] is the taxonomy surfaced to callers of the lifecycle manager
//! and the query engine. Leaf errors from the embedding client and the durable
//! store convert into it so `?` works across layers.

use crate::storage::{SnapshotError, StoreError};
use thiserror::Error;

/// Errors that can occur while talking to the embedding capability.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Transport or provider-side failure
    #[error("Embedding request failed: {0}")]
    RequestFailed(String),
    /// Provider answered with something we cannot use
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
    /// One batch of a multi-batch call failed; the whole call is abandoned
    #[error("Embedding batch {batch}/{total} failed: {reason}")]
    BatchFailed {
        /// 1-based batch number
        batch: usize,
        /// Total number of batches in the call
        total: usize,
        /// Underlying failure
        reason: String,
    },
    /// The model started producing vectors of a different length
    #[error("Embedding dimension changed: pinned {pinned}, got {actual}")]
    DimensionChanged {
        /// Dimension observed first in this client's lifetime
        pinned: usize,
        /// Dimension just observed
        actual: usize,
    },
    /// Invalid client or provider configuration
    #[error("Invalid embedding configuration: {0}")]
    InvalidConfig(String),
}

/// Errors surfaced by the index lifecycle and the hybrid query engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable index exists yet
    #[error("Index not ready")]
    NotReady,
    /// Snapshot or query vector incompatible with the current embedding model
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was built with
        expected: usize,
        /// Dimension that was presented
        actual: usize,
    },
    /// Build attempted with an empty document set
    #[error("No documents to index")]
    NoDocuments,
    /// External embedding call failed
    #[error("Embedding failure: {0}")]
    EmbeddingFailure(#[from] EmbeddingError),
    /// Durable store read or write failed
    #[error("Store failure: {0}")]
    StoreFailure(#[from] StoreError),
    /// Local snapshot unreadable or internally inconsistent
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
    /// Nothing has been persisted yet
    #[error("No persisted index found")]
    SnapshotMissing,
    /// Record count, index rows and store rows disagree
    #[error(
        "Inconsistent index: {records} records, {index_rows} index rows, {store_rows} store rows"
    )]
    Inconsistent {
        /// In-memory document records
        records: usize,
        /// Rows in the similarity index
        index_rows: usize,
        /// Rows in the durable store
        store_rows: usize,
    },
    /// The document source could not produce chunks
    #[error("Document source failed: {0}")]
    Source(String),
    /// Invalid configuration or input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<SnapshotError> for EngineError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Missing(_) => EngineError::SnapshotMissing,
            other => EngineError::CorruptSnapshot(other.to_string()),
        }
    }
}

impl EngineError {
    /// Whether a failed load should fall through to a fresh build.
    ///
    /// Embedding and configuration failures are not recoverable by rebuilding,
    /// so `initialize` surfaces them instead of burning a build on them.
    pub fn triggers_rebuild(&self) -> bool {
        matches!(
            self,
            EngineError::DimensionMismatch { .. }
                | EngineError::CorruptSnapshot(_)
                | EngineError::SnapshotMissing
                | EngineError::Inconsistent { .. }
                | EngineError::StoreFailure(_)
        )
    }
}
