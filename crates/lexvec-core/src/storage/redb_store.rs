//! Redb-backed document store.
//!
//! Uses [redb](https://github.com/cberner/redb) - a pure Rust, ACID-compliant,
//! embedded B-tree database.
//!
//! # Tables
//!
//! - `records`: Ordinal (u64) -> content + metadata (JSON)
//! - `embeddings`: Ordinal (u64) -> `Vec<f32>` (raw bytes, little-endian)
//! - `metadata`: key (string) -> value (JSON); holds the build manifest
//!
//! `replace_all` deletes and recreates all three tables inside one write
//! transaction, so a crash mid-build leaves the previous build intact.

use super::document_store::{DocumentStore, StoreError, StoredIndex};
use super::{decode_embedding, encode_embeddings};
use crate::search::types::{DocumentRecord, IndexManifest, RecordBody};
use async_trait::async_trait;
use redb::{Database, ReadTransaction, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const RECORDS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const EMBEDDINGS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("embeddings");
const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

// Metadata keys
const MANIFEST_KEY: &str = "manifest";

fn db_err(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::DatabaseError(format!("{}: {}", context, e))
}

/// Redb-backed document store.
///
/// # Example
///
/// ```ignore
/// use lexvec_core::storage::RedbDocumentStore;
///
/// let store = RedbDocumentStore::open("./data/index.redb")?;
/// store.replace_all(&manifest, &records).await?;
/// ```
pub struct RedbDocumentStore {
    db: Arc<Database>,
}

impl RedbDocumentStore {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates the database file and all required tables if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| StoreError::DatabaseError(format!("Failed to open database: {}", e)))?;
        let store = Self { db: Arc::new(db) };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| db_err("Failed to begin write transaction", e))?;

        write_txn
            .open_table(RECORDS_TABLE)
            .map_err(|e| db_err("Failed to create records table", e))?;
        write_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(|e| db_err("Failed to create embeddings table", e))?;
        write_txn
            .open_table(METADATA_TABLE)
            .map_err(|e| db_err("Failed to create metadata table", e))?;

        write_txn
            .commit()
            .map_err(|e| db_err("Failed to commit table creation", e))
    }

    fn serialize_body(record: &DocumentRecord) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(&RecordBody::from_record(record)).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize record: {}", e))
        })
    }

    fn deserialize_body(bytes: &[u8]) -> Result<RecordBody, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| {
            StoreError::SerializationError(format!("Failed to deserialize record: {}", e))
        })
    }

    fn read_manifest(&self) -> Result<Option<IndexManifest>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| db_err("Failed to begin read transaction", e))?;
        Self::manifest_in(&read_txn)
    }

    fn manifest_in(read_txn: &ReadTransaction) -> Result<Option<IndexManifest>, StoreError> {
        let table = read_txn
            .open_table(METADATA_TABLE)
            .map_err(|e| db_err("Failed to open metadata table", e))?;

        let Some(guard) = table
            .get(MANIFEST_KEY)
            .map_err(|e| db_err("Failed to read manifest", e))?
        else {
            return Ok(None);
        };
        let manifest = serde_json::from_slice(guard.value()).map_err(|e| {
            StoreError::SerializationError(format!("Failed to deserialize manifest: {}", e))
        })?;
        Ok(Some(manifest))
    }
}

#[async_trait]
impl DocumentStore for RedbDocumentStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.create_tables()
    }

    async fn replace_all(
        &self,
        manifest: &IndexManifest,
        records: &[DocumentRecord],
    ) -> Result<(), StoreError> {
        let manifest_bytes = serde_json::to_vec(manifest).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize manifest: {}", e))
        })?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| db_err("Failed to begin write transaction", e))?;

        write_txn
            .delete_table(RECORDS_TABLE)
            .map_err(|e| db_err("Failed to drop records table", e))?;
        write_txn
            .delete_table(EMBEDDINGS_TABLE)
            .map_err(|e| db_err("Failed to drop embeddings table", e))?;

        {
            let mut record_table = write_txn
                .open_table(RECORDS_TABLE)
                .map_err(|e| db_err("Failed to open records table", e))?;
            let mut embedding_table = write_txn
                .open_table(EMBEDDINGS_TABLE)
                .map_err(|e| db_err("Failed to open embeddings table", e))?;
            let mut metadata_table = write_txn
                .open_table(METADATA_TABLE)
                .map_err(|e| db_err("Failed to open metadata table", e))?;

            for record in records {
                let body = Self::serialize_body(record)?;
                let embedding = encode_embeddings([record.embedding.as_slice()]);
                let key = record.ordinal.as_u64();

                record_table
                    .insert(key, body.as_slice())
                    .map_err(|e| db_err("Failed to insert record", e))?;
                embedding_table
                    .insert(key, embedding.as_slice())
                    .map_err(|e| db_err("Failed to insert embedding", e))?;
            }

            metadata_table
                .insert(MANIFEST_KEY, manifest_bytes.as_slice())
                .map_err(|e| db_err("Failed to write manifest", e))?;
        }

        write_txn
            .commit()
            .map_err(|e| db_err("Failed to commit build", e))?;

        debug!(
            "Replaced store contents with {} records (build {})",
            records.len(),
            manifest.build_id
        );
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| db_err("Failed to begin read transaction", e))?;
        let table = read_txn
            .open_table(RECORDS_TABLE)
            .map_err(|e| db_err("Failed to open records table", e))?;
        let len = table
            .len()
            .map_err(|e| db_err("Failed to count records", e))?;
        Ok(len as usize)
    }

    async fn manifest(&self) -> Result<Option<IndexManifest>, StoreError> {
        self.read_manifest()
    }

    async fn load_all(&self) -> Result<Option<StoredIndex>, StoreError> {
        // One read transaction so the manifest and rows come from the same build
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| db_err("Failed to begin read transaction", e))?;
        let Some(manifest) = Self::manifest_in(&read_txn)? else {
            return Ok(None);
        };
        let record_table = read_txn
            .open_table(RECORDS_TABLE)
            .map_err(|e| db_err("Failed to open records table", e))?;
        let embedding_table = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(|e| db_err("Failed to open embeddings table", e))?;

        let mut records = Vec::with_capacity(manifest.document_count);
        let iter = record_table
            .iter()
            .map_err(|e| db_err("Failed to iterate records", e))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| db_err("Failed to read record", e))?;
            let ordinal = key.value();
            let body = Self::deserialize_body(value.value())?;

            let embedding = embedding_table
                .get(ordinal)
                .map_err(|e| db_err("Failed to read embedding", e))?
                .ok_or_else(|| {
                    StoreError::Incomplete(format!("record {} has no embedding", ordinal))
                })?;
            let embedding = decode_embedding(embedding.value()).ok_or_else(|| {
                StoreError::Incomplete(format!("embedding {} has a truncated byte length", ordinal))
            })?;

            records.push(body.into_record(embedding));
        }

        let stored = StoredIndex { manifest, records };
        stored.validate()?;
        Ok(Some(stored))
    }
}
