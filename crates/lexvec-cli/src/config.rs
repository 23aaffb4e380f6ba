//! Configuration and path resolution for the CLI.
//!
//! Every engine setting can come from a flag or an environment variable:
//! - `LEXVEC_DATA_DIR` - where the redb store and the snapshot live
//! - `LEXVEC_EMBEDDING_URL` / `LEXVEC_EMBEDDING_MODEL` / `LEXVEC_API_KEY` - embedding endpoint
//! - `LEXVEC_OFFLINE_DIM` - use the hashing embedder instead of an endpoint

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use directories::ProjectDirs;
use lexvec_core::config::{DEFAULT_BATCH_DELAY_MS, DEFAULT_EMBED_BATCH_SIZE, DEFAULT_TOP_K};
use lexvec_core::embedding::{
    BackpressureConfig, EmbeddingClient, EmbeddingProvider, HashingEmbedder,
    HttpEmbeddingProvider,
};
use lexvec_core::lifecycle::IndexLifecycleManager;
use lexvec_core::storage::{LocalSnapshot, RedbDocumentStore};
use lexvec_core::EngineConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Database file name
const DATABASE_FILENAME: &str = "index.redb";

/// Snapshot directory name
const SNAPSHOT_DIRNAME: &str = "snapshot";

const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Engine settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Custom data directory (default: platform standard location)
    #[arg(long, env = "LEXVEC_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// OpenAI-compatible embeddings endpoint
    #[arg(long, env = "LEXVEC_EMBEDDING_URL", global = true)]
    pub embedding_url: Option<String>,

    /// Embedding model name sent to the endpoint
    #[arg(long, env = "LEXVEC_EMBEDDING_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Bearer token for the embedding endpoint
    #[arg(long, env = "LEXVEC_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Use the offline hashing embedder with this dimension
    #[arg(long, env = "LEXVEC_OFFLINE_DIM", conflicts_with = "embedding_url", global = true)]
    pub offline_dim: Option<usize>,

    /// Results returned by `search` when no --limit is given
    #[arg(long, env = "LEXVEC_TOP_K", default_value_t = DEFAULT_TOP_K, global = true)]
    pub top_k: usize,

    /// Texts per embedding request
    #[arg(long, default_value_t = DEFAULT_EMBED_BATCH_SIZE, global = true)]
    pub batch_size: usize,

    /// Pause between embedding requests, in milliseconds (0 disables)
    #[arg(long, default_value_t = DEFAULT_BATCH_DELAY_MS, global = true)]
    pub batch_delay_ms: u64,
}

impl EngineArgs {
    /// Engine configuration derived from the flags.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let backpressure = match self.batch_delay_ms {
            0 => BackpressureConfig::None,
            delay_ms => BackpressureConfig::FixedDelay { delay_ms },
        };
        let config = EngineConfig {
            top_k_results: self.top_k,
            embed_batch_size: self.batch_size,
            backpressure,
        };
        config.validate()?;
        Ok(config)
    }

    fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        if let Some(dimension) = self.offline_dim {
            info!("Using offline hashing embedder (dimension {})", dimension);
            return Ok(Arc::new(HashingEmbedder::new(dimension)?));
        }

        let Some(url) = &self.embedding_url else {
            bail!(
                "No embedding backend configured.\n\
                 Pass --embedding-url (or set LEXVEC_EMBEDDING_URL), \
                 or use --offline-dim for the hashing embedder."
            );
        };
        info!("Using embedding endpoint {} (model {})", url, self.model);
        let mut provider =
            HttpEmbeddingProvider::new(url.as_str(), self.model.as_str())?.with_normalization(true);
        if let Some(key) = &self.api_key {
            provider = provider.with_api_key(key.as_str());
        }
        Ok(Arc::new(provider))
    }

    /// Opens the store and snapshot under the data directory and wires up a manager.
    pub fn open_manager(&self) -> Result<IndexLifecycleManager<RedbDocumentStore>> {
        let config = self.engine_config()?;
        let client = EmbeddingClient::new(self.provider()?, &config)?;

        let data_dir = get_data_dir(self.data_dir.as_ref())?;
        std::fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create data directory: {}", data_dir.display())
        })?;

        let db_path = database_path(&data_dir);
        info!("Opening database: {}", db_path.display());
        let store = RedbDocumentStore::open(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        Ok(
            IndexLifecycleManager::new(Arc::new(client), store, config)
                .with_snapshot(LocalSnapshot::new(snapshot_path(&data_dir))),
        )
    }
}

/// Returns the data directory.
///
/// - macOS: `~/Library/Application Support/dev.lexvec.lexvec/`
/// - Linux: `~/.local/share/lexvec/`
/// - Windows: `%APPDATA%\lexvec\lexvec\data\`
pub fn get_data_dir(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = custom_dir {
        return Ok(dir.clone());
    }

    ProjectDirs::from("dev", "lexvec", "lexvec")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine data directory"))
}

/// Returns the path to the database file.
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_FILENAME)
}

/// Returns the path to the snapshot directory.
pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_DIRNAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args() -> EngineArgs {
        EngineArgs {
            data_dir: None,
            embedding_url: None,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            offline_dim: None,
            top_k: DEFAULT_TOP_K,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
        }
    }

    #[test]
    fn test_get_data_dir() {
        let dir = get_data_dir(None).unwrap();
        let dir_str = dir.to_string_lossy();
        assert!(
            dir_str.contains("lexvec"),
            "Data dir should use the project name: {}",
            dir_str
        );
    }

    #[test]
    fn test_custom_data_dir() {
        let custom = PathBuf::from("/tmp/custom-data");
        let dir = get_data_dir(Some(&custom)).unwrap();
        assert_eq!(dir, custom);
        assert_eq!(database_path(&dir), custom.join("index.redb"));
        assert_eq!(snapshot_path(&dir), custom.join("snapshot"));
    }

    #[test]
    fn test_zero_delay_disables_backpressure() {
        let config = EngineArgs {
            batch_delay_ms: 0,
            ..args()
        }
        .engine_config()
        .unwrap();
        assert_eq!(config.backpressure, BackpressureConfig::None);
    }

    #[test]
    fn test_top_k_flag_feeds_config() {
        let config = EngineArgs { top_k: 9, ..args() }.engine_config().unwrap();
        assert_eq!(config.top_k_results, 9);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = EngineArgs {
            batch_size: 0,
            ..args()
        }
        .engine_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_backend_is_reported() {
        let temp = TempDir::new().unwrap();
        let result = EngineArgs {
            data_dir: Some(temp.path().to_path_buf()),
            ..args()
        }
        .open_manager();
        let err = result.err().unwrap().to_string();
        assert!(err.contains("No embedding backend configured"));
    }

    #[test]
    fn test_offline_manager_opens_store() {
        let temp = TempDir::new().unwrap();
        let manager = EngineArgs {
            data_dir: Some(temp.path().to_path_buf()),
            offline_dim: Some(32),
            ..args()
        }
        .open_manager()
        .unwrap();
        assert_eq!(manager.embedder().model_id(), "hashing-fnv1a-32");
        assert!(temp.path().join("index.redb").exists());
    }
}
