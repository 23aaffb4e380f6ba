use serde::Serialize;
use std::fmt;

/// Where the lifecycle manager is in its build/load cycle.
///
/// ```text
/// Empty ──load──▶ Loading ──▶ Ready
///   │                          │
///   └──build──▶ Building ◀─rebuild
///                  │
///                  ▼
///                Ready
/// ```
///
/// A failed load or build falls back to `Ready` if an index was already
/// published, otherwise to `Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Empty,
    Loading,
    Building,
    Ready,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Empty => "empty",
            LifecycleState::Loading => "loading",
            LifecycleState::Building => "building",
            LifecycleState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Summary of the active index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexInfo {
    pub state: LifecycleState,
    /// Records in the published index
    pub total_documents: usize,
    /// Rows in the published similarity index
    pub index_size: usize,
    /// Embedding dimension, once an index is published
    pub dimension: Option<usize>,
    pub model_id: String,
    pub build_id: Option<String>,
    /// Unix timestamp of the published build
    pub created_at: Option<u64>,
    /// Configured default result count
    pub top_k: usize,
}
