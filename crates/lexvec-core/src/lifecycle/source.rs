//! Document sources feeding full rebuilds.
//!
//! The engine does not chunk documents itself. Whatever produced the chunks
//! (a PDF pipeline, a markdown splitter, a crawler) exposes them through
//! [`DocumentSource`], and every rebuild pulls the complete set again.

use crate::error::EngineError;
use crate::search::types::Chunk;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Supplier of the complete, ordered chunk set for a build.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Returns every chunk to index, in the order ordinals should follow.
    async fn load_chunks(&self) -> Result<Vec<Chunk>, EngineError>;
}

#[async_trait]
impl<T: DocumentSource + ?Sized> DocumentSource for Arc<T> {
    async fn load_chunks(&self) -> Result<Vec<Chunk>, EngineError> {
        (**self).load_chunks().await
    }
}

/// In-memory chunk list; the contents can be swapped between rebuilds.
#[derive(Default)]
pub struct VecDocumentSource {
    chunks: Mutex<Vec<Chunk>>,
}

impl VecDocumentSource {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks: Mutex::new(chunks),
        }
    }

    /// Replaces the chunks returned by the next `load_chunks`.
    pub fn set_chunks(&self, chunks: Vec<Chunk>) {
        *self.chunks.lock().unwrap_or_else(PoisonError::into_inner) = chunks;
    }
}

#[async_trait]
impl DocumentSource for VecDocumentSource {
    async fn load_chunks(&self) -> Result<Vec<Chunk>, EngineError> {
        Ok(self
            .chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// JSON Lines file with one `{"text": .., "metadata": {..}}` object per line.
///
/// Blank lines are skipped. A malformed line fails the whole load with its
/// line number.
#[derive(Debug, Clone)]
pub struct JsonlDocumentSource {
    path: PathBuf,
}

impl JsonlDocumentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Parses JSONL text into chunks.
    pub fn parse(contents: &str) -> Result<Vec<Chunk>, EngineError> {
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str::<Chunk>(line)
                    .map_err(|e| EngineError::Source(format!("line {}: {}", index + 1, e)))
            })
            .collect()
    }
}

#[async_trait]
impl DocumentSource for JsonlDocumentSource {
    async fn load_chunks(&self) -> Result<Vec<Chunk>, EngineError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| EngineError::Source(format!("{}: {}", self.path.display(), e)))?;
        let chunks = Self::parse(&contents)?;
        debug!("Read {} chunks from {}", chunks.len(), self.path.display());
        Ok(chunks)
    }
}
