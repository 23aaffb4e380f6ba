//! Index lifecycle: build, persist, reload and rebuild.
//!
//! [`IndexLifecycleManager`] owns the one active `(records, similarity index)`
//! pair and everything needed to reproduce it: the embedding client, the
//! durable [`DocumentStore`], an optional [`LocalSnapshot`] cache and a
//! [`DocumentSource`] for rebuilds.
//!
//! ## Persistence
//!
//! The durable store is authoritative. The snapshot is only used when its
//! manifest matches the store's (same `build_id` and document count);
//! otherwise the store is read and the snapshot refreshed from it. Snapshot
//! write failures are logged and never fail a build.
//!
//! ## Publication
//!
//! A new pair is assembled off to the side and swapped in as one `Arc` only
//! after the store write and the triple-count check succeed. Searches that
//! already hold the previous `Arc` finish against it. A failed build leaves
//! the previous pair serving.

mod source;
mod state;

pub use source::{DocumentSource, JsonlDocumentSource, VecDocumentSource};
pub use state::{IndexInfo, LifecycleState};

use crate::config::EngineConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{EngineError, EngineResult};
use crate::search::{
    ActiveIndex, Chunk, DocumentMetadata, DocumentRecord, HybridQueryEngine, IndexManifest,
    Ordinal, SearchResult,
};
use crate::storage::{DocumentStore, LocalSnapshot, SnapshotError, StoredIndex};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Owns the active index and drives its build/load cycle.
///
/// # Thread Safety
///
/// All methods take `&self`. Builds and loads are serialised by an async
/// mutex; searches never wait on it and only clone the active `Arc` under a
/// short read lock.
///
/// # Example
///
/// ```ignore
/// let manager = IndexLifecycleManager::new(embedder, RedbDocumentStore::open(path)?, config)
///     .with_snapshot(LocalSnapshot::new(snapshot_dir))
///     .with_source(JsonlDocumentSource::new("chunks.jsonl"));
///
/// manager.initialize(false).await?;
/// let hits = manager.search("error E1234", 5).await?;
/// ```
pub struct IndexLifecycleManager<S: DocumentStore> {
    embedder: Arc<EmbeddingClient>,
    store: S,
    snapshot: Option<LocalSnapshot>,
    source: Option<Box<dyn DocumentSource>>,
    config: EngineConfig,
    state: RwLock<LifecycleState>,
    active: RwLock<Option<Arc<ActiveIndex>>>,
    build_lock: Mutex<()>,
}

impl<S: DocumentStore> IndexLifecycleManager<S> {
    pub fn new(embedder: Arc<EmbeddingClient>, store: S, config: EngineConfig) -> Self {
        Self {
            embedder,
            store,
            snapshot: None,
            source: None,
            config,
            state: RwLock::new(LifecycleState::Empty),
            active: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    /// Caches each build in a local snapshot directory.
    pub fn with_snapshot(mut self, snapshot: LocalSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Sets where `rebuild` and `initialize` pull chunks from.
    pub fn with_source(mut self, source: impl DocumentSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<EmbeddingClient> {
        &self.embedder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The currently published index, if any.
    pub fn active_index(&self) -> Option<Arc<ActiveIndex>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Brings the manager to `Ready`.
    ///
    /// Unless `force_rebuild` is set, tries [`load`](Self::load) first. A
    /// missing, corrupt, stale or dimension-incompatible persisted index
    /// falls through to a full rebuild from the document source. Embedding
    /// failures during the load are returned as-is.
    pub async fn initialize(&self, force_rebuild: bool) -> EngineResult<()> {
        if force_rebuild {
            info!("Forced rebuild requested");
            return self.rebuild().await;
        }

        match self.load().await {
            Ok(()) => Ok(()),
            Err(e) if e.triggers_rebuild() => {
                warn!("Persisted index unusable ({}), rebuilding", e);
                self.rebuild().await
            }
            Err(e) => Err(e),
        }
    }

    /// Hydrates the active index from persistence.
    ///
    /// # Errors
    ///
    /// - `SnapshotMissing` if nothing has been persisted
    /// - `DimensionMismatch` if the live model no longer produces the
    ///   persisted dimension
    /// - `Inconsistent` if records, index rows and store rows disagree
    pub async fn load(&self) -> EngineResult<()> {
        let _guard = self.build_lock.lock().await;
        let start = Instant::now();
        self.set_state(LifecycleState::Loading);

        match self.hydrate().await {
            Ok(index) => {
                info!(
                    "Loaded index build {} ({} documents, dimension {}) in {:.2}ms",
                    index.manifest().build_id,
                    index.len(),
                    index.dimension(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
                self.publish(index);
                Ok(())
            }
            Err(e) => {
                self.settle();
                Err(e)
            }
        }
    }

    /// Builds and publishes a fresh index over `chunks`.
    ///
    /// Ordinals follow input order. An empty input fails with `NoDocuments`
    /// before anything is touched.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn build(&self, chunks: Vec<Chunk>) -> EngineResult<()> {
        let _guard = self.build_lock.lock().await;
        self.build_locked(chunks).await
    }

    /// Pulls every chunk from the document source and builds again.
    pub async fn rebuild(&self) -> EngineResult<()> {
        let _guard = self.build_lock.lock().await;
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| EngineError::Source("no document source configured".to_string()))?;
        let chunks = source.load_chunks().await?;
        debug!("Document source returned {} chunks", chunks.len());
        self.build_locked(chunks).await
    }

    /// Query engine bound to the current index.
    pub fn query_engine(&self) -> EngineResult<HybridQueryEngine> {
        let index = self.active_index().ok_or(EngineError::NotReady)?;
        Ok(HybridQueryEngine::new(index, Arc::clone(&self.embedder)))
    }

    pub async fn search(&self, query: &str, k: usize) -> EngineResult<Vec<SearchResult>> {
        self.query_engine()?.search(query, k).await
    }

    pub async fn search_bytes(&self, query: &[u8], k: usize) -> EngineResult<Vec<SearchResult>> {
        self.query_engine()?.search_bytes(query, k).await
    }

    /// Searches with the configured `top_k_results`.
    pub async fn search_default(&self, query: &str) -> EngineResult<Vec<SearchResult>> {
        self.search(query, self.config.top_k_results).await
    }

    pub fn info(&self) -> IndexInfo {
        let active = self.active_index();
        let manifest = active.as_ref().map(|index| index.manifest());
        IndexInfo {
            state: self.state(),
            total_documents: active.as_ref().map_or(0, |index| index.len()),
            index_size: active.as_ref().map_or(0, |index| index.index_size()),
            dimension: active.as_ref().map(|index| index.dimension()),
            model_id: manifest
                .map(|m| m.model_id.clone())
                .unwrap_or_else(|| self.embedder.model_id().to_string()),
            build_id: manifest.map(|m| m.build_id.clone()),
            created_at: manifest.map(|m| m.created_at),
            top_k: self.config.top_k_results,
        }
    }

    async fn build_locked(&self, chunks: Vec<Chunk>) -> EngineResult<()> {
        if chunks.is_empty() {
            return Err(EngineError::NoDocuments);
        }
        let start = Instant::now();
        self.set_state(LifecycleState::Building);

        match self.construct(chunks).await {
            Ok(index) => {
                info!(
                    "Built index build {} ({} documents, dimension {}) in {:.2}s",
                    index.manifest().build_id,
                    index.len(),
                    index.dimension(),
                    start.elapsed().as_secs_f64()
                );
                self.publish(index);
                Ok(())
            }
            Err(e) => {
                warn!("Build failed: {}", e);
                self.settle();
                Err(e)
            }
        }
    }

    async fn construct(&self, chunks: Vec<Chunk>) -> EngineResult<ActiveIndex> {
        self.store.ensure_schema().await?;

        let (texts, metadata): (Vec<String>, Vec<DocumentMetadata>) = chunks
            .into_iter()
            .map(|chunk| (chunk.text, chunk.metadata))
            .unzip();

        // A build defines the dimension; forget whatever was pinned before
        self.embedder.reset();
        let embeddings = self.embedder.embed_many(&texts).await?;
        let dimension = embeddings
            .first()
            .map(Vec::len)
            .ok_or(EngineError::NoDocuments)?;

        let records: Vec<DocumentRecord> = texts
            .into_iter()
            .zip(metadata)
            .zip(embeddings)
            .enumerate()
            .map(|(row, ((content, metadata), embedding))| DocumentRecord {
                ordinal: Ordinal::from_index(row),
                content,
                metadata,
                embedding,
            })
            .collect();

        let manifest = IndexManifest::new(self.embedder.model_id(), dimension, records.len());
        let index = ActiveIndex::assemble(manifest, records)?;

        self.store
            .replace_all(index.manifest(), index.records())
            .await?;
        index.check_consistency(self.store.count().await?)?;

        self.refresh_snapshot(index.manifest(), index.records())
            .await;
        Ok(index)
    }

    async fn hydrate(&self) -> EngineResult<ActiveIndex> {
        self.store.ensure_schema().await?;
        let manifest = self
            .store
            .manifest()
            .await?
            .ok_or(EngineError::SnapshotMissing)?;
        if !manifest.is_compatible() {
            return Err(EngineError::CorruptSnapshot(format!(
                "stored schema version {} requires reader version >= {}",
                manifest.schema_version, manifest.min_compatible_version
            )));
        }

        let stored = self.read_persisted(&manifest).await?;

        self.embedder.reset();
        let live = self.embedder.probe_dimension().await?;
        if live != stored.manifest.embedding_dimension {
            return Err(EngineError::DimensionMismatch {
                expected: stored.manifest.embedding_dimension,
                actual: live,
            });
        }

        let index = ActiveIndex::assemble(stored.manifest, stored.records)?;
        index.check_consistency(self.store.count().await?)?;
        Ok(index)
    }

    /// Reads the build described by `manifest`, preferring a matching snapshot.
    async fn read_persisted(&self, manifest: &IndexManifest) -> EngineResult<StoredIndex> {
        if let Some(snapshot) = &self.snapshot {
            match snapshot.read_manifest().await {
                Ok(cached)
                    if cached.build_id == manifest.build_id
                        && cached.document_count == manifest.document_count =>
                {
                    match snapshot.load().await {
                        Ok(stored) if stored.manifest.build_id == manifest.build_id => {
                            debug!("Using local snapshot for build {}", manifest.build_id);
                            return Ok(stored);
                        }
                        Ok(_) => warn!("Snapshot changed while reading, using store"),
                        Err(e) => warn!("Ignoring unusable snapshot: {}", e),
                    }
                }
                Ok(cached) => warn!(
                    "Snapshot build {} is stale (store has build {}), reloading from store",
                    cached.build_id, manifest.build_id
                ),
                Err(SnapshotError::Missing(_)) => debug!("No local snapshot, reading store"),
                Err(e) => warn!("Ignoring unusable snapshot: {}", e),
            }
        }

        let stored = self
            .store
            .load_all()
            .await?
            .ok_or(EngineError::SnapshotMissing)?;
        self.refresh_snapshot(&stored.manifest, &stored.records)
            .await;
        Ok(stored)
    }

    async fn refresh_snapshot(&self, manifest: &IndexManifest, records: &[DocumentRecord]) {
        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.save(manifest, records).await {
                warn!(
                    "Failed to write snapshot to {}: {}",
                    snapshot.path().display(),
                    e
                );
            }
        }
    }

    fn publish(&self, index: ActiveIndex) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(index));
        self.set_state(LifecycleState::Ready);
    }

    /// Falls back after a failed load or build.
    fn settle(&self) {
        let fallback = if self.active_index().is_some() {
            LifecycleState::Ready
        } else {
            LifecycleState::Empty
        };
        self.set_state(fallback);
    }

    fn set_state(&self, state: LifecycleState) {
        let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            debug!("Lifecycle state {} -> {}", *current, state);
            *current = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{BackpressureConfig, EmbeddingProvider, HashingEmbedder};
    use crate::error::EmbeddingError;
    use crate::storage::InMemoryDocumentStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Hashing embedder whose dimension and availability can change mid-test.
    struct SwitchableProvider {
        dimension: AtomicUsize,
        failing: AtomicBool,
    }

    impl SwitchableProvider {
        fn new(dimension: usize) -> Arc<Self> {
            Arc::new(Self {
                dimension: AtomicUsize::new(dimension),
                failing: AtomicBool::new(false),
            })
        }

        fn hasher(&self) -> Result<HashingEmbedder, EmbeddingError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EmbeddingError::RequestFailed("provider offline".into()));
            }
            HashingEmbedder::new(self.dimension.load(Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl EmbeddingProvider for SwitchableProvider {
        fn model_id(&self) -> &str {
            "switchable"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.hasher()?.embed_text(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let hasher = self.hasher()?;
            Ok(texts.iter().map(|t| hasher.embed_text(t)).collect())
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            backpressure: BackpressureConfig::None,
            ..Default::default()
        }
    }

    fn manager<S: DocumentStore>(
        provider: Arc<SwitchableProvider>,
        store: S,
    ) -> IndexLifecycleManager<S> {
        let client = EmbeddingClient::new(provider, &config()).unwrap();
        IndexLifecycleManager::new(Arc::new(client), store, config())
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts.iter().map(|t| Chunk::new(*t)).collect()
    }

    #[tokio::test]
    async fn test_search_before_ready() {
        let manager = manager(SwitchableProvider::new(8), InMemoryDocumentStore::new());
        assert_eq!(manager.state(), LifecycleState::Empty);
        assert!(matches!(
            manager.search("anything", 3).await,
            Err(EngineError::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_build_publishes_and_persists() {
        let manager = manager(SwitchableProvider::new(8), InMemoryDocumentStore::new());
        manager
            .build(chunks(&["red apple", "green pear", "blue berry"]))
            .await
            .unwrap();

        assert_eq!(manager.state(), LifecycleState::Ready);
        let info = manager.info();
        assert_eq!(info.total_documents, 3);
        assert_eq!(info.index_size, 3);
        assert_eq!(info.dimension, Some(8));
        assert_eq!(info.model_id, "switchable");
        assert_eq!(manager.store().count().await.unwrap(), 3);

        let results = manager.search("green pear", 1).await.unwrap();
        assert_eq!(results[0].content, "green pear");
    }

    #[tokio::test]
    async fn test_empty_build_mutates_nothing() {
        let manager = manager(SwitchableProvider::new(8), InMemoryDocumentStore::new());
        assert!(matches!(
            manager.build(Vec::new()).await,
            Err(EngineError::NoDocuments)
        ));
        assert_eq!(manager.state(), LifecycleState::Empty);
        assert!(manager.store().manifest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_build_keeps_previous_index() {
        let provider = SwitchableProvider::new(8);
        let manager = manager(provider.clone(), InMemoryDocumentStore::new());
        manager.build(chunks(&["first build"])).await.unwrap();
        let before = manager.info().build_id;

        provider.failing.store(true, Ordering::SeqCst);
        let err = manager.build(chunks(&["second", "build"])).await.unwrap_err();
        assert!(matches!(err, EngineError::EmbeddingFailure(_)));

        assert_eq!(manager.state(), LifecycleState::Ready);
        assert_eq!(manager.info().build_id, before);
        assert_eq!(manager.store().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_without_persisted_index() {
        let manager = manager(SwitchableProvider::new(8), InMemoryDocumentStore::new());
        assert!(matches!(
            manager.load().await,
            Err(EngineError::SnapshotMissing)
        ));
        assert_eq!(manager.state(), LifecycleState::Empty);
    }

    #[tokio::test]
    async fn test_initialize_builds_from_source_then_loads() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let provider = SwitchableProvider::new(8);

        let first = manager(provider.clone(), Arc::clone(&store))
            .with_source(VecDocumentSource::new(chunks(&["alpha", "beta"])));
        first.initialize(false).await.unwrap();
        let build_id = first.info().build_id;

        // Second manager over the same store loads instead of rebuilding
        let second = manager(provider, Arc::clone(&store));
        second.initialize(false).await.unwrap();
        assert_eq!(second.info().build_id, build_id);
        assert_eq!(second.info().total_documents, 2);
    }

    #[tokio::test]
    async fn test_rebuild_without_source() {
        let manager = manager(SwitchableProvider::new(8), InMemoryDocumentStore::new());
        assert!(matches!(
            manager.rebuild().await,
            Err(EngineError::Source(_))
        ));
    }

    #[tokio::test]
    async fn test_load_prefers_matching_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(InMemoryDocumentStore::new());
        let provider = SwitchableProvider::new(8);
        let snapshot = LocalSnapshot::new(temp.path().join("snapshot"));

        let builder = manager(provider.clone(), Arc::clone(&store)).with_snapshot(snapshot.clone());
        builder.build(chunks(&["one", "two"])).await.unwrap();
        let cached = snapshot.read_manifest().await.unwrap();
        assert_eq!(Some(cached.build_id.clone()), builder.info().build_id);

        let loader = manager(provider, Arc::clone(&store)).with_snapshot(snapshot);
        loader.load().await.unwrap();
        assert_eq!(loader.info().build_id, Some(cached.build_id));
    }

    #[tokio::test]
    async fn test_info_serializes() {
        let manager = manager(SwitchableProvider::new(4), InMemoryDocumentStore::new());
        let json = serde_json::to_value(manager.info()).unwrap();
        assert_eq!(json["state"], "empty");
        assert_eq!(json["total_documents"], 0);
        assert_eq!(json["top_k"], 5);
    }
}
