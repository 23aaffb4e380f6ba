// HybridQueryEngine - keyword pass + semantic pass + fusion over one published index

use super::fusion::{fuse, FusedHit};
use super::keyword::KeywordIndex;
use super::types::{DocumentRecord, IndexManifest, Ordinal, SearchResult};
use super::vector::SimilarityIndex;
use crate::config::CANDIDATE_MULTIPLIER;
use crate::embedding::EmbeddingClient;
use crate::error::{EngineError, EngineResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// Immutable `(records, similarity index)` pair produced by one build.
///
/// The lifecycle manager publishes an `Arc<ActiveIndex>` and replaces it
/// wholesale on rebuild; nothing mutates it after assembly.
#[derive(Debug)]
pub struct ActiveIndex {
    manifest: IndexManifest,
    records: Vec<DocumentRecord>,
    vectors: SimilarityIndex,
    keywords: KeywordIndex,
}

impl ActiveIndex {
    /// Assembles the searchable pair from persisted or freshly built records.
    ///
    /// Records must carry dense ordinals `0..N-1` in order and agree with the
    /// manifest on count and dimension.
    pub fn assemble(manifest: IndexManifest, records: Vec<DocumentRecord>) -> EngineResult<Self> {
        if records.is_empty() {
            return Err(EngineError::NoDocuments);
        }

        if let Some((row, record)) = records
            .iter()
            .enumerate()
            .find(|(row, record)| record.ordinal.as_index() != *row)
        {
            return Err(EngineError::InvalidInput(format!(
                "record at row {} has ordinal {}",
                row, record.ordinal
            )));
        }

        if manifest.document_count != records.len() {
            return Err(EngineError::Inconsistent {
                records: records.len(),
                index_rows: records.len(),
                store_rows: manifest.document_count,
            });
        }

        let embeddings: Vec<&[f32]> = records.iter().map(|r| r.embedding.as_slice()).collect();
        let vectors = SimilarityIndex::build(&embeddings)?;
        if vectors.dimension() != manifest.embedding_dimension {
            return Err(EngineError::DimensionMismatch {
                expected: manifest.embedding_dimension,
                actual: vectors.dimension(),
            });
        }

        let keywords = KeywordIndex::new(&records);

        Ok(Self {
            manifest,
            records,
            vectors,
            keywords,
        })
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn record(&self, ordinal: Ordinal) -> Option<&DocumentRecord> {
        self.records.get(ordinal.as_index())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows in the similarity index.
    pub fn index_size(&self) -> usize {
        self.vectors.size()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.dimension()
    }

    /// Checks the triple-count invariant against the durable store's row count.
    pub fn check_consistency(&self, store_rows: usize) -> EngineResult<()> {
        let records = self.records.len();
        let index_rows = self.vectors.size();
        if records == index_rows && index_rows == store_rows {
            Ok(())
        } else {
            Err(EngineError::Inconsistent {
                records,
                index_rows,
                store_rows,
            })
        }
    }
}

/// Hybrid query engine bound to one published index.
///
/// Cheap to construct; holding one keeps its index alive even if the
/// lifecycle manager publishes a newer one in the meantime.
#[derive(Clone)]
pub struct HybridQueryEngine {
    index: Arc<ActiveIndex>,
    embedder: Arc<EmbeddingClient>,
}

impl HybridQueryEngine {
    pub fn new(index: Arc<ActiveIndex>, embedder: Arc<EmbeddingClient>) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &ActiveIndex {
        &self.index
    }

    /// Returns up to `k` records ranked by fused keyword + semantic score.
    ///
    /// # Errors
    ///
    /// - `EmbeddingFailure` if the query cannot be embedded
    /// - `DimensionMismatch` if the query vector does not fit the index
    #[instrument(skip_all, fields(k, query_len = query.len()))]
    pub async fn search(&self, query: &str, k: usize) -> EngineResult<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let candidates = k.saturating_mul(CANDIDATE_MULTIPLIER);

        let keyword_hits = self.index.keywords.search(query, candidates);

        let query_embedding = self.embedder.embed_one(query).await?;
        let semantic_hits = self.index.vectors.query(&query_embedding, candidates)?;

        let fused = fuse(&keyword_hits, &semantic_hits, k);
        let results: Vec<SearchResult> = fused
            .into_iter()
            .filter_map(|hit| self.to_result(hit))
            .collect();

        debug!(
            "Search returned {} results ({} keyword, {} semantic candidates) in {:.2}ms",
            results.len(),
            keyword_hits.len(),
            semantic_hits.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(results)
    }

    /// Like [`search`](Self::search) but accepts arbitrary bytes.
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD before searching.
    pub async fn search_bytes(&self, query: &[u8], k: usize) -> EngineResult<Vec<SearchResult>> {
        let query = String::from_utf8_lossy(query);
        self.search(&query, k).await
    }

    fn to_result(&self, hit: FusedHit) -> Option<SearchResult> {
        self.index.record(hit.ordinal).map(|record| SearchResult {
            ordinal: hit.ordinal,
            score: hit.score,
            semantic_score: hit.semantic_score,
            keyword_score: hit.keyword_score,
            exact_match: hit.exact_match,
            content: record.content.clone(),
            metadata: record.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::embedding::{BackpressureConfig, EmbeddingClient, EmbeddingProvider};
    use crate::error::EmbeddingError;
    use crate::search::types::DocumentMetadata;
    use async_trait::async_trait;

    /// Maps every text to a fixed query vector.
    struct FixedProvider(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn model_id(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.0.clone())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    fn engine(query_vector: Vec<f32>, rows: &[(&str, Vec<f32>)]) -> HybridQueryEngine {
        let records: Vec<DocumentRecord> = rows
            .iter()
            .enumerate()
            .map(|(i, (text, embedding))| DocumentRecord {
                ordinal: Ordinal::from_index(i),
                content: text.to_string(),
                metadata: DocumentMetadata::new().with("chunk_id", i),
                embedding: embedding.clone(),
            })
            .collect();
        let manifest = IndexManifest::new("fixed", records[0].embedding.len(), records.len());
        let index = ActiveIndex::assemble(manifest, records).unwrap();

        let config = EngineConfig {
            backpressure: BackpressureConfig::None,
            ..Default::default()
        };
        let client = EmbeddingClient::new(Arc::new(FixedProvider(query_vector)), &config).unwrap();
        HybridQueryEngine::new(Arc::new(index), Arc::new(client))
    }

    #[tokio::test]
    async fn test_exact_match_ranks_first() {
        let engine = engine(
            vec![0.0, 1.0],
            &[
                ("ABC123XYZ part sheet", vec![1.0, 0.0]),
                ("hello world", vec![0.6, 0.8]),
                ("", vec![0.0, 1.0]),
            ],
        );

        let results = engine.search("ABC123XYZ find me", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].ordinal, Ordinal::from_index(0));
        assert!(results[0].exact_match);
        assert_eq!(results[1].ordinal, Ordinal::from_index(2));
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_k_zero_is_empty() {
        let engine = engine(vec![1.0], &[("a", vec![1.0])]);
        assert!(engine.search("anything", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let engine = engine(vec![1.0, 0.0, 0.0], &[("a", vec![1.0, 0.0])]);
        assert!(matches!(
            engine.search("a", 1).await,
            Err(EngineError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_search_bytes_handles_invalid_utf8() {
        let engine = engine(vec![1.0], &[("Z9 marker", vec![1.0]), ("other", vec![0.5])]);
        let results = engine.search_bytes(b"Z9 \xff\xfe", 2).await.unwrap();
        assert_eq!(results[0].ordinal, Ordinal::from_index(0));
        assert!(results[0].exact_match);
    }

    #[test]
    fn test_assemble_rejects_sparse_ordinals() {
        let records = vec![DocumentRecord {
            ordinal: Ordinal::from_index(1),
            content: "a".into(),
            metadata: DocumentMetadata::default(),
            embedding: vec![1.0],
        }];
        let manifest = IndexManifest::new("m", 1, 1);
        assert!(matches!(
            ActiveIndex::assemble(manifest, records),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_check_consistency() {
        let records = vec![DocumentRecord {
            ordinal: Ordinal::from_index(0),
            content: "a".into(),
            metadata: DocumentMetadata::default(),
            embedding: vec![1.0],
        }];
        let index = ActiveIndex::assemble(IndexManifest::new("m", 1, 1), records).unwrap();
        assert!(index.check_consistency(1).is_ok());
        assert!(matches!(
            index.check_consistency(2),
            Err(EngineError::Inconsistent {
                records: 1,
                index_rows: 1,
                store_rows: 2
            })
        ));
    }
}
