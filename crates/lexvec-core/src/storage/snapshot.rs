//! Local snapshot of the active build.
//!
//! A directory holding three files:
//!
//! - `manifest.json` - the build's [`IndexManifest`]
//! - `records.json` - ordinals, content and metadata in ordinal order
//! - `embeddings.bin` - all embeddings, little-endian f32, row-major
//!
//! Snapshots are written into a sibling staging directory and renamed into
//! place, so a reader never sees a half-written snapshot. Reading validates
//! the schema version, record count, byte length and ordinal density.

use super::document_store::StoredIndex;
use super::{decode_embedding, encode_embeddings};
use crate::search::types::{DocumentRecord, IndexManifest, RecordBody};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const MANIFEST_FILE: &str = "manifest.json";
const RECORDS_FILE: &str = "records.json";
const EMBEDDINGS_FILE: &str = "embeddings.bin";

/// Errors from reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot has been written at this location
    #[error("No snapshot at {}", .0.display())]
    Missing(PathBuf),
    /// Snapshot exists but fails validation
    #[error("{0}")]
    Corrupt(String),
    /// Filesystem failure
    #[error("Snapshot I/O error: {0}")]
    Io(String),
    /// Manifest or records could not be encoded
    #[error("Snapshot serialization error: {0}")]
    Serialization(String),
}

/// Snapshot directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalSnapshot {
    dir: PathBuf,
}

impl LocalSnapshot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(suffix);
        self.dir.with_file_name(name)
    }

    /// Writes a snapshot of one build, replacing any previous one.
    pub async fn save(
        &self,
        manifest: &IndexManifest,
        records: &[DocumentRecord],
    ) -> Result<(), SnapshotError> {
        let staging = self.sibling(".staging");
        let retired = self.sibling(".old");

        remove_dir_if_exists(&staging).await?;
        if let Some(parent) = staging.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::create_dir_all(&staging).await.map_err(io_error)?;

        let manifest_bytes = serde_json::to_vec_pretty(manifest)
            .map_err(|e| SnapshotError::Serialization(format!("manifest: {}", e)))?;
        let bodies: Vec<RecordBody> = records.iter().map(RecordBody::from_record).collect();
        let record_bytes = serde_json::to_vec(&bodies)
            .map_err(|e| SnapshotError::Serialization(format!("records: {}", e)))?;
        let embeddings = encode_embeddings(records.iter().map(|r| r.embedding.as_slice()));

        tokio::fs::write(staging.join(RECORDS_FILE), record_bytes)
            .await
            .map_err(io_error)?;
        tokio::fs::write(staging.join(EMBEDDINGS_FILE), embeddings)
            .await
            .map_err(io_error)?;
        // Manifest last: a staging dir without one is never promoted
        tokio::fs::write(staging.join(MANIFEST_FILE), manifest_bytes)
            .await
            .map_err(io_error)?;

        remove_dir_if_exists(&retired).await?;
        if tokio::fs::try_exists(&self.dir).await.map_err(io_error)? {
            tokio::fs::rename(&self.dir, &retired)
                .await
                .map_err(io_error)?;
        }
        tokio::fs::rename(&staging, &self.dir)
            .await
            .map_err(io_error)?;
        remove_dir_if_exists(&retired).await?;

        debug!(
            "Wrote snapshot of {} records to {}",
            records.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Reads only the manifest.
    pub async fn read_manifest(&self) -> Result<IndexManifest, SnapshotError> {
        let bytes = self.read_file(MANIFEST_FILE).await?;
        let manifest: IndexManifest = serde_json::from_slice(&bytes)
            .map_err(|e| SnapshotError::Corrupt(format!("unreadable manifest: {}", e)))?;
        if !manifest.is_compatible() {
            return Err(SnapshotError::Corrupt(format!(
                "schema version {} requires reader version >= {}",
                manifest.schema_version, manifest.min_compatible_version
            )));
        }
        Ok(manifest)
    }

    /// Reads and validates the full snapshot.
    pub async fn load(&self) -> Result<StoredIndex, SnapshotError> {
        let manifest = self.read_manifest().await?;

        let record_bytes = self.read_file(RECORDS_FILE).await?;
        let bodies: Vec<RecordBody> = serde_json::from_slice(&record_bytes)
            .map_err(|e| SnapshotError::Corrupt(format!("unreadable records: {}", e)))?;

        let dimension = manifest.embedding_dimension;
        let count = manifest.document_count;
        if bodies.len() != count {
            return Err(SnapshotError::Corrupt(format!(
                "manifest lists {} documents, records file has {}",
                count,
                bodies.len()
            )));
        }
        if dimension == 0 {
            return Err(SnapshotError::Corrupt("embedding dimension is 0".to_string()));
        }

        let embedding_bytes = self.read_file(EMBEDDINGS_FILE).await?;
        let expected_len = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .ok_or_else(|| {
                SnapshotError::Corrupt(format!(
                    "{} documents of dimension {} overflow the embeddings size",
                    count, dimension
                ))
            })?;
        if embedding_bytes.len() != expected_len {
            return Err(SnapshotError::Corrupt(format!(
                "embeddings file has {} bytes, expected {}",
                embedding_bytes.len(),
                expected_len
            )));
        }
        let flat = decode_embedding(&embedding_bytes)
            .ok_or_else(|| SnapshotError::Corrupt("truncated embeddings file".to_string()))?;

        let mut records = Vec::with_capacity(count);
        for (row, (body, embedding)) in bodies
            .into_iter()
            .zip(flat.chunks_exact(dimension))
            .enumerate()
        {
            if body.ordinal.as_index() != row {
                return Err(SnapshotError::Corrupt(format!(
                    "record at row {} has ordinal {}",
                    row, body.ordinal
                )));
            }
            records.push(body.into_record(embedding.to_vec()));
        }

        Ok(StoredIndex { manifest, records })
    }

    /// Removes the snapshot. Missing snapshots are not an error.
    pub async fn clear(&self) -> Result<(), SnapshotError> {
        remove_dir_if_exists(&self.dir).await
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, SnapshotError> {
        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound && name == MANIFEST_FILE => {
                Err(SnapshotError::Missing(self.dir.clone()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SnapshotError::Corrupt(format!("{} is missing", name)))
            }
            Err(e) => Err(io_error(e)),
        }
    }
}

fn io_error(e: std::io::Error) -> SnapshotError {
    SnapshotError::Io(e.to_string())
}

async fn remove_dir_if_exists(path: &Path) -> Result<(), SnapshotError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::{DocumentMetadata, Ordinal};
    use tempfile::TempDir;

    fn stored(texts: &[&str]) -> StoredIndex {
        let records: Vec<DocumentRecord> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| DocumentRecord {
                ordinal: Ordinal::from_index(i),
                content: text.to_string(),
                metadata: DocumentMetadata::new().with("page", i as i64),
                embedding: vec![i as f32, 1.0],
            })
            .collect();
        StoredIndex {
            manifest: IndexManifest::new("m", 2, records.len()),
            records,
        }
    }

    #[tokio::test]
    async fn test_missing_snapshot() {
        let temp = TempDir::new().unwrap();
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));
        assert!(matches!(
            snapshot.load().await,
            Err(SnapshotError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));
        let original = stored(&["one", "two", "three"]);

        snapshot
            .save(&original.manifest, &original.records)
            .await
            .unwrap();
        let loaded = snapshot.load().await.unwrap();

        assert_eq!(loaded.manifest, original.manifest);
        assert_eq!(loaded.records, original.records);
        assert!(!temp.path().join("snapshot.staging").exists());
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let temp = TempDir::new().unwrap();
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));

        let first = stored(&["a", "b", "c"]);
        snapshot.save(&first.manifest, &first.records).await.unwrap();
        let second = stored(&["z"]);
        snapshot.save(&second.manifest, &second.records).await.unwrap();

        let loaded = snapshot.load().await.unwrap();
        assert_eq!(loaded.manifest.build_id, second.manifest.build_id);
        assert_eq!(loaded.records.len(), 1);
        assert!(!temp.path().join("snapshot.old").exists());
    }

    #[tokio::test]
    async fn test_truncated_embeddings_are_corrupt() {
        let temp = TempDir::new().unwrap();
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));
        let data = stored(&["a", "b"]);
        snapshot.save(&data.manifest, &data.records).await.unwrap();

        let path = snapshot.path().join(EMBEDDINGS_FILE);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        assert!(matches!(
            snapshot.load().await,
            Err(SnapshotError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_dimension_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));
        let data = stored(&["a", "b"]);
        snapshot.save(&data.manifest, &data.records).await.unwrap();

        let mut manifest = data.manifest.clone();
        manifest.embedding_dimension = usize::MAX / 2;
        std::fs::write(
            snapshot.path().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();

        let err = snapshot.load().await.unwrap_err();
        assert!(matches!(err, SnapshotError::Corrupt(msg) if msg.contains("overflow")));
    }

    #[test]
    fn test_encoding_errors_are_not_io() {
        let json_err = serde_json::from_slice::<IndexManifest>(b"{").unwrap_err();
        let err = SnapshotError::Serialization(format!("manifest: {}", json_err));
        let message = err.to_string();
        assert!(message.starts_with("Snapshot serialization error: manifest:"));
        assert!(!message.contains("I/O"));
    }

    #[tokio::test]
    async fn test_missing_records_file_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));
        let data = stored(&["a"]);
        snapshot.save(&data.manifest, &data.records).await.unwrap();
        std::fs::remove_file(snapshot.path().join(RECORDS_FILE)).unwrap();

        assert!(matches!(
            snapshot.load().await,
            Err(SnapshotError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_manifest_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));
        let data = stored(&["a"]);
        snapshot.save(&data.manifest, &data.records).await.unwrap();
        std::fs::write(snapshot.path().join(MANIFEST_FILE), b"{not json").unwrap();

        assert!(matches!(
            snapshot.read_manifest().await,
            Err(SnapshotError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let temp = TempDir::new().unwrap();
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));
        snapshot.clear().await.unwrap();
        let data = stored(&["a"]);
        snapshot.save(&data.manifest, &data.records).await.unwrap();
        snapshot.clear().await.unwrap();
        assert!(!snapshot.path().exists());
    }
}
