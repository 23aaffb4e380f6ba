//! # lexvec Core
//!
//! Hybrid retrieval over chunked text: exact keyword matching fused with dense
//! inner-product similarity, plus the lifecycle (build, persist, reload,
//! rebuild) of the index that backs it.
//!
//! The engine does not chunk documents or run an embedding model itself. It
//! consumes chunks from a [`lifecycle::DocumentSource`] and vectors from an
//! [`embedding::EmbeddingProvider`], and persists records through a
//! [`storage::DocumentStore`].
//!
//! ## Modules
//!
//! - [`search`] - Keyword extraction, flat similarity index, fusion and the hybrid query engine
//! - [`embedding`] - Embedding provider trait, batching client and backpressure
//! - [`storage`] - Durable store trait (redb, in-memory) and the local snapshot cache
//! - [`lifecycle`] - Build / load / rebuild orchestration and atomic index publication
//! - [`config`] - Production defaults and [`EngineConfig`](config::EngineConfig)
//! - [`error`] - Error taxonomy shared across the crate
//!
//! ## Example
//!
//! ```ignore
//! use lexvec_core::config::EngineConfig;
//! use lexvec_core::embedding::{EmbeddingClient, HashingEmbedder};
//! use lexvec_core::lifecycle::{IndexLifecycleManager, JsonlDocumentSource};
//! use lexvec_core::storage::InMemoryDocumentStore;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::default();
//! let embedder = EmbeddingClient::new(Arc::new(HashingEmbedder::new(256)?), &config)?;
//! let manager = IndexLifecycleManager::new(Arc::new(embedder), InMemoryDocumentStore::new(), config)
//!     .with_source(JsonlDocumentSource::new("chunks.jsonl"));
//!
//! manager.initialize(false).await?;
//! let results = manager.search("invoice 4711000123", 5).await?;
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod lifecycle;
pub mod search;
pub mod storage;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
