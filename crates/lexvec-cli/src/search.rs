//! Search command implementation.
//!
//! Loads the persisted index (never builds one) and runs a hybrid query.

use anyhow::{anyhow, Context, Result};
use lexvec_core::lifecycle::IndexLifecycleManager;
use lexvec_core::search::SearchResult;
use lexvec_core::storage::DocumentStore;
use tracing::info;

/// Performs a search against the existing index.
///
/// # Arguments
///
/// * `manager` - Lifecycle manager over the persisted index
/// * `query` - The search query text
/// * `limit` - Maximum number of results to return, or the configured top-k
pub async fn execute_search<S: DocumentStore>(
    manager: &IndexLifecycleManager<S>,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<SearchResult>> {
    manager.load().await.map_err(|e| {
        anyhow!(
            "No usable index ({}).\n\
             Build one with `lexvec build --chunks <FILE>` first.",
            e
        )
    })?;
    info!("Loaded index with {} documents", manager.info().total_documents);

    info!("Searching for: \"{}\"", query);
    let results = match limit {
        Some(limit) => manager.search(query, limit).await,
        None => manager.search_default(query).await,
    }
    .context("Search failed")?;
    info!("Found {} results", results.len());
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexvec_core::config::EngineConfig;
    use lexvec_core::embedding::{BackpressureConfig, EmbeddingClient, HashingEmbedder};
    use lexvec_core::search::Chunk;
    use lexvec_core::storage::InMemoryDocumentStore;
    use std::sync::Arc;

    fn manager(store: Arc<InMemoryDocumentStore>) -> IndexLifecycleManager<Arc<InMemoryDocumentStore>> {
        manager_with_top_k(store, 5)
    }

    fn manager_with_top_k(
        store: Arc<InMemoryDocumentStore>,
        top_k_results: usize,
    ) -> IndexLifecycleManager<Arc<InMemoryDocumentStore>> {
        let config = EngineConfig {
            top_k_results,
            backpressure: BackpressureConfig::None,
            ..Default::default()
        };
        let client =
            EmbeddingClient::new(Arc::new(HashingEmbedder::new(32).unwrap()), &config).unwrap();
        IndexLifecycleManager::new(Arc::new(client), store, config)
    }

    #[tokio::test]
    async fn test_search_missing_index() {
        let manager = manager(Arc::new(InMemoryDocumentStore::new()));
        let err = execute_search(&manager, "test", Some(10)).await.unwrap_err();
        assert!(err.to_string().contains("No usable index"));
    }

    #[tokio::test]
    async fn test_search_persisted_index() {
        let store = Arc::new(InMemoryDocumentStore::new());
        manager(Arc::clone(&store))
            .build(vec![
                Chunk::new("order 5551234 shipped"),
                Chunk::new("nothing to see"),
            ])
            .await
            .unwrap();

        let results = execute_search(&manager(store), "where is 5551234", Some(1))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].exact_match);
        assert_eq!(results[0].content, "order 5551234 shipped");
    }

    #[tokio::test]
    async fn test_search_without_limit_uses_configured_top_k() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let chunks = (0..6)
            .map(|i| Chunk::new(format!("shipment note {}", i)))
            .collect();
        manager(Arc::clone(&store)).build(chunks).await.unwrap();

        let results = execute_search(&manager_with_top_k(Arc::clone(&store), 2), "shipment", None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);

        let results = execute_search(&manager_with_top_k(store, 2), "shipment", Some(4))
            .await
            .unwrap();
        assert_eq!(results.len(), 4);
    }
}
