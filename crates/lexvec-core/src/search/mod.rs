//! Hybrid retrieval combining exact keyword matching with dense similarity.
//!
//! # Architecture
//!
//! - `types`: Core types (Ordinal, Chunk, DocumentRecord, SearchResult, IndexManifest)
//! - `keyword`: Identifier-like keyword extraction and the substring keyword pass
//! - `vector`: Flat exact inner-product similarity index
//! - `fusion`: Exact-match-dominant score fusion
//! - `engine`: `ActiveIndex` (published records + index) and `HybridQueryEngine`
//! - `context`: Numbered context blocks and citations for answer generation
//!
//! # Algorithm
//!
//! For a query and result count `k`, both passes fetch `2k` candidates:
//!
//! 1. **Keyword pass**: extract keywords (long digit runs, numeric codes,
//!    mixed letter/digit tokens), lower-case them and count how many distinct
//!    keywords occur in each record's lower-cased content.
//! 2. **Semantic pass**: embed the query and take the `2k` rows with the
//!    highest inner product.
//! 3. **Fusion**: any keyword hit gets a `+10.0` bonus on top of its
//!    similarity; everything else ranks by similarity alone. Ties fall back
//!    to ascending ordinal so rankings are reproducible.
//!
//! # Usage
//!
//! ```ignore
//! use lexvec_core::search::{ActiveIndex, HybridQueryEngine, IndexManifest};
//!
//! let index = ActiveIndex::assemble(IndexManifest::new("model", 384, records.len()), records)?;
//! let engine = HybridQueryEngine::new(Arc::new(index), Arc::new(embedder));
//! let results = engine.search("ticket TK20931", 5).await?;
//! ```

pub mod context;
mod engine;
pub mod fusion;
pub mod keyword;
pub mod types;
pub mod vector;

pub use context::{citations, format_context, SourceCitation};
pub use engine::{ActiveIndex, HybridQueryEngine};
pub use keyword::{extract_keywords, KeywordIndex};
pub use types::{
    get_current_timestamp, validate_dimension, Chunk, DocumentMetadata, DocumentRecord,
    IndexManifest, MetadataValue, Ordinal, SearchResult, CURRENT_SCHEMA_VERSION,
};
pub use vector::SimilarityIndex;
