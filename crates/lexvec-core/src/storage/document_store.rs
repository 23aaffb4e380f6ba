//! Durable document store trait.
//!
//! The store holds exactly one build at a time. A build is written with
//! [`DocumentStore::replace_all`], which must swap the previous contents for
//! the new ones atomically: readers observe either the old set or the new
//! set, never a mix.

use crate::search::types::{DocumentRecord, IndexManifest};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database error (redb)
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored build is missing rows or disagrees with its manifest
    #[error("Incomplete store contents: {0}")]
    Incomplete(String),
}

/// Everything persisted for one build.
#[derive(Debug, Clone)]
pub struct StoredIndex {
    pub manifest: IndexManifest,
    /// Records in ordinal order, embeddings attached
    pub records: Vec<DocumentRecord>,
}

impl StoredIndex {
    /// Checks that records are dense `0..N-1`, agree with the manifest count
    /// and all carry embeddings of the manifest dimension.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.records.len() != self.manifest.document_count {
            return Err(StoreError::Incomplete(format!(
                "manifest lists {} documents, found {}",
                self.manifest.document_count,
                self.records.len()
            )));
        }
        for (row, record) in self.records.iter().enumerate() {
            if record.ordinal.as_index() != row {
                return Err(StoreError::Incomplete(format!(
                    "expected ordinal {}, found {}",
                    row, record.ordinal
                )));
            }
            if record.embedding.len() != self.manifest.embedding_dimension {
                return Err(StoreError::Incomplete(format!(
                    "record {} has {} embedding values, expected {}",
                    row,
                    record.embedding.len(),
                    self.manifest.embedding_dimension
                )));
            }
        }
        Ok(())
    }
}

/// Durable store for the active build.
///
/// # Design Notes
///
/// - Operations are self-contained; `replace_all` is the only write and runs
///   as a single transaction.
/// - `load_all` returns `Ok(None)` when nothing has been written yet and
///   `StoreError::Incomplete` when the contents disagree with the manifest.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates tables or other structures if missing. Idempotent.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Atomically replaces all stored records and the manifest.
    async fn replace_all(
        &self,
        manifest: &IndexManifest,
        records: &[DocumentRecord],
    ) -> Result<(), StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Manifest of the stored build, if any.
    async fn manifest(&self) -> Result<Option<IndexManifest>, StoreError>;

    /// Loads the stored build in ordinal order.
    async fn load_all(&self) -> Result<Option<StoredIndex>, StoreError>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        (**self).ensure_schema().await
    }

    async fn replace_all(
        &self,
        manifest: &IndexManifest,
        records: &[DocumentRecord],
    ) -> Result<(), StoreError> {
        (**self).replace_all(manifest, records).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        (**self).count().await
    }

    async fn manifest(&self) -> Result<Option<IndexManifest>, StoreError> {
        (**self).manifest().await
    }

    async fn load_all(&self) -> Result<Option<StoredIndex>, StoreError> {
        (**self).load_all().await
    }
}

/// In-memory document store.
///
/// Contents live only as long as the value; useful for tests and for
/// callers that always rebuild on start.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    contents: RwLock<Option<StoredIndex>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn replace_all(
        &self,
        manifest: &IndexManifest,
        records: &[DocumentRecord],
    ) -> Result<(), StoreError> {
        let mut contents = self
            .contents
            .write()
            .map_err(|e| StoreError::DatabaseError(format!("Lock poisoned: {}", e)))?;
        *contents = Some(StoredIndex {
            manifest: manifest.clone(),
            records: records.to_vec(),
        });
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let contents = self
            .contents
            .read()
            .map_err(|e| StoreError::DatabaseError(format!("Lock poisoned: {}", e)))?;
        Ok(contents.as_ref().map_or(0, |c| c.records.len()))
    }

    async fn manifest(&self) -> Result<Option<IndexManifest>, StoreError> {
        let contents = self
            .contents
            .read()
            .map_err(|e| StoreError::DatabaseError(format!("Lock poisoned: {}", e)))?;
        Ok(contents.as_ref().map(|c| c.manifest.clone()))
    }

    async fn load_all(&self) -> Result<Option<StoredIndex>, StoreError> {
        let contents = self
            .contents
            .read()
            .map_err(|e| StoreError::DatabaseError(format!("Lock poisoned: {}", e)))?;
        match contents.as_ref() {
            Some(stored) => {
                stored.validate()?;
                Ok(Some(stored.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::{DocumentMetadata, Ordinal};

    fn make_records(n: usize) -> Vec<DocumentRecord> {
        (0..n)
            .map(|i| DocumentRecord {
                ordinal: Ordinal::from_index(i),
                content: format!("chunk {}", i),
                metadata: DocumentMetadata::new().with("chunk_id", i),
                embedding: vec![i as f32, 1.0],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryDocumentStore::new();
        store.ensure_schema().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.manifest().await.unwrap().is_none());
        assert!(store.load_all().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_all_overwrites() {
        let store = InMemoryDocumentStore::new();
        let first = IndexManifest::new("m", 2, 3);
        store.replace_all(&first, &make_records(3)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let second = IndexManifest::new("m", 2, 1);
        store.replace_all(&second, &make_records(1)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let loaded = store.load_all().await.unwrap().unwrap();
        assert_eq!(loaded.manifest.build_id, second.build_id);
        assert_eq!(loaded.records, make_records(1));
    }

    #[test]
    fn test_validate_detects_count_mismatch() {
        let stored = StoredIndex {
            manifest: IndexManifest::new("m", 2, 4),
            records: make_records(3),
        };
        assert!(matches!(stored.validate(), Err(StoreError::Incomplete(_))));
    }

    #[test]
    fn test_validate_detects_gaps_and_bad_dimensions() {
        let mut records = make_records(2);
        records[1].ordinal = Ordinal::from_index(5);
        let stored = StoredIndex {
            manifest: IndexManifest::new("m", 2, 2),
            records,
        };
        assert!(stored.validate().is_err());

        let stored = StoredIndex {
            manifest: IndexManifest::new("m", 3, 2),
            records: make_records(2),
        };
        assert!(stored.validate().is_err());
    }
}
