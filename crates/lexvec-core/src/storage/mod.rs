//! Persistence for built indexes.
//!
//! # Storage Abstractions
//!
//! ## [`DocumentStore`]
//! Durable, authoritative copy of the last successful build: every record,
//! its embedding and the build manifest. Replaced wholesale on each build.
//!
//! ## [`LocalSnapshot`]
//! Fast-path cache on the local filesystem. Trusted only while its manifest
//! agrees with the durable store's (same `build_id` and count); otherwise the
//! engine hydrates from the store and rewrites the snapshot.
//!
//! # Implementations
//!
//! - [`InMemoryDocumentStore`] - Process-local store for tests and ephemeral use
//! - [`RedbDocumentStore`] - Embedded ACID store on disk (feature `redb-store`)

mod document_store;
mod snapshot;

#[cfg(feature = "redb-store")]
mod redb_store;

pub use document_store::{DocumentStore, InMemoryDocumentStore, StoreError, StoredIndex};
pub use snapshot::{LocalSnapshot, SnapshotError};

#[cfg(feature = "redb-store")]
pub use redb_store::RedbDocumentStore;

/// Encodes embeddings as packed little-endian f32 values (4 bytes each).
///
/// Multiple vectors are written back to back in row-major order.
pub(crate) fn encode_embeddings<'a, I>(vectors: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut bytes = Vec::new();
    for vector in vectors {
        bytes.reserve(vector.len() * 4);
        for &value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

/// Decodes packed little-endian f32 values.
///
/// Returns `None` if the byte length is not a multiple of 4.
pub(crate) fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_bytes_are_little_endian() {
        let bytes = encode_embeddings([[1.0f32, -2.5].as_slice()]);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&bytes), Some(vec![1.0, -2.5]));
    }

    #[test]
    fn test_rows_are_concatenated() {
        let rows = [vec![1.0f32, 2.0], vec![3.0, 4.0]];
        let bytes = encode_embeddings(rows.iter().map(Vec::as_slice));
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_embedding(&bytes), Some(vec![1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn test_truncated_bytes_rejected() {
        assert_eq!(decode_embedding(&[0, 0, 128]), None);
    }
}
