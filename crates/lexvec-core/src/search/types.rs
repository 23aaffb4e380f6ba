use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Returns the current Unix timestamp (seconds since UNIX_EPOCH).
///
/// If the system time is before UNIX_EPOCH, returns 0 instead of panicking.
pub fn get_current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Dense zero-based position of a record within one build.
///
/// Ordinals are assigned `0..N-1` in input order at build time and serve as
/// the join key between the record list, the similarity index rows and the
/// durable store. They are only meaningful within a single build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ordinal(u64);

impl Ordinal {
    /// Creates an ordinal from a raw u64 value.
    pub fn from_u64(ordinal: u64) -> Self {
        Self(ordinal)
    }

    /// Creates an ordinal from a row position.
    pub fn from_index(index: usize) -> Self {
        Self(index as u64)
    }

    /// Returns the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the row position this ordinal refers to.
    pub fn as_index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scalar metadata value.
///
/// Serialised untagged, so JSON `"a"`, `3`, `2.5` and `true` map onto the
/// matching variant directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Integer(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Integer(value as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Ordered provenance map attached to every chunk.
///
/// Conventionally carries `source_file`, `page`, `chunk_id` and `chunk_size`;
/// anything else is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentMetadata(BTreeMap<String, MetadataValue>);

impl DocumentMetadata {
    pub const SOURCE_FILE: &'static str = "source_file";
    pub const PAGE: &'static str = "page";
    pub const CHUNK_ID: &'static str = "chunk_id";
    pub const CHUNK_SIZE: &'static str = "chunk_size";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `source_file` rendered as text, if present.
    pub fn source_file(&self) -> Option<String> {
        self.get(Self::SOURCE_FILE).map(ToString::to_string)
    }

    /// `page` rendered as text, if present.
    pub fn page(&self) -> Option<String> {
        self.get(Self::PAGE).map(ToString::to_string)
    }

    /// `chunk_id` rendered as text, if present.
    pub fn chunk_id(&self) -> Option<String> {
        self.get(Self::CHUNK_ID).map(ToString::to_string)
    }
}

/// Input unit produced by an external chunker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Searchable text
    pub text: String,
    /// Provenance metadata
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Indexed unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    /// Position within the build
    pub ordinal: Ordinal,
    /// Chunk text
    pub content: String,
    /// Chunk metadata
    pub metadata: DocumentMetadata,
    /// Embedding of `content`, fixed length `D` per build
    pub embedding: Vec<f32>,
}

/// Persisted body of a record; embeddings are stored separately as raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RecordBody {
    pub ordinal: Ordinal,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl RecordBody {
    pub(crate) fn from_record(record: &DocumentRecord) -> Self {
        Self {
            ordinal: record.ordinal,
            content: record.content.clone(),
            metadata: record.metadata.clone(),
        }
    }

    pub(crate) fn into_record(self, embedding: Vec<f32>) -> DocumentRecord {
        DocumentRecord {
            ordinal: self.ordinal,
            content: self.content,
            metadata: self.metadata,
            embedding,
        }
    }
}

/// One ranked hit returned by the hybrid query engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Record ordinal
    pub ordinal: Ordinal,
    /// Final fused score
    pub score: f32,
    /// Inner-product similarity, if the record appeared in the semantic pass
    pub semantic_score: Option<f32>,
    /// Scaled keyword component, if the record appeared in the keyword pass
    pub keyword_score: Option<f32>,
    /// Whether at least one query keyword occurs in the content
    pub exact_match: bool,
    /// Record content
    pub content: String,
    /// Record metadata
    pub metadata: DocumentMetadata,
}

/// Validates that an embedding has the expected dimension.
///
/// ```ignore
/// validate_dimension(3, vec![1.0, 2.0, 3.0].len())?; // Ok
/// validate_dimension(5, 3)?; // Err(DimensionMismatch)
/// ```
pub fn validate_dimension(expected: usize, actual: usize) -> Result<(), EngineError> {
    if actual == expected {
        Ok(())
    } else {
        Err(EngineError::DimensionMismatch { expected, actual })
    }
}

// ============================================================================
// Persistence Types
// ============================================================================

/// Current schema version for persisted indexes.
///
/// The version history:
/// - v1: records + little-endian f32 embeddings + manifest
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Manifest describing one build, written alongside every persisted copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Schema version this index was written with
    pub schema_version: u32,
    /// Minimum schema version required to read this index
    pub min_compatible_version: u32,
    /// Unique per build; ties the snapshot cache to the durable store
    pub build_id: String,
    /// Embedding dimension `D`
    pub embedding_dimension: usize,
    /// Number of records `N`
    pub document_count: usize,
    /// Embedding model that produced the vectors
    pub model_id: String,
    /// Unix timestamp of the build
    pub created_at: u64,
}

impl IndexManifest {
    /// Creates a manifest for a fresh build with a new build id.
    pub fn new(model_id: impl Into<String>, embedding_dimension: usize, document_count: usize) -> Self {
        let created_at = get_current_timestamp();
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            min_compatible_version: 1,
            build_id: Uuid::new_v4().to_string(),
            embedding_dimension,
            document_count,
            model_id: model_id.into(),
            created_at,
        }
    }

    /// Checks if this index can be read by the current version.
    pub fn is_compatible(&self) -> bool {
        CURRENT_SCHEMA_VERSION >= self.min_compatible_version
    }
}
