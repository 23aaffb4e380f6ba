//! Build, rebuild and info commands.

use anyhow::{Context, Result};
use lexvec_core::lifecycle::{IndexInfo, IndexLifecycleManager, JsonlDocumentSource};
use lexvec_core::storage::DocumentStore;
use std::path::Path;
use tracing::info;

/// Indexes a JSONL chunk file.
///
/// Without `force`, an existing compatible index is loaded and left alone;
/// a missing, stale or dimension-incompatible one is rebuilt from `chunks`.
pub async fn execute_build<S: DocumentStore>(
    manager: IndexLifecycleManager<S>,
    chunks: &Path,
    force: bool,
) -> Result<IndexInfo> {
    let manager = manager.with_source(JsonlDocumentSource::new(chunks));
    manager
        .initialize(force)
        .await
        .with_context(|| format!("Failed to build index from {}", chunks.display()))?;
    Ok(manager.info())
}

/// Unconditionally rebuilds from a JSONL chunk file.
pub async fn execute_rebuild<S: DocumentStore>(
    manager: IndexLifecycleManager<S>,
    chunks: &Path,
) -> Result<IndexInfo> {
    let manager = manager.with_source(JsonlDocumentSource::new(chunks));
    info!("Rebuilding index from {}", chunks.display());
    manager
        .rebuild()
        .await
        .with_context(|| format!("Failed to rebuild index from {}", chunks.display()))?;
    Ok(manager.info())
}

/// Loads the persisted index and reports on it.
pub async fn execute_info<S: DocumentStore>(manager: IndexLifecycleManager<S>) -> Result<IndexInfo> {
    manager
        .load()
        .await
        .context("No usable index. Run `lexvec build --chunks <FILE>` first")?;
    Ok(manager.info())
}
