//! Production configuration constants.
//!
//! Defaults used by the lifecycle manager, the embedding client and the
//! fusion step. The serialisable [`EngineConfig`] carries the subset that
//! callers are expected to tune.
//!
//! # Usage
//!
//! ```
//! use lexvec_core::config::{EngineConfig, DEFAULT_TOP_K};
//!
//! let config = EngineConfig::default();
//! assert_eq!(config.top_k_results, DEFAULT_TOP_K);
//! ```

use crate::embedding::BackpressureConfig;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

// =============================================================================
// Retrieval
// =============================================================================

/// Number of results returned when the caller does not ask for a specific k.
pub const DEFAULT_TOP_K: usize = 5;

/// Each pass (keyword and semantic) fetches `k * CANDIDATE_MULTIPLIER`
/// candidates before fusion.
pub const CANDIDATE_MULTIPLIER: usize = 2;

// =============================================================================
// Fusion
// =============================================================================

/// Additive bonus for records that contain at least one query keyword.
///
/// Large enough that any exact match outranks every non-matching record,
/// since inner products of unit vectors never exceed 1.0.
pub const EXACT_MATCH_BONUS: f32 = 10.0;

/// Raw keyword hit count is scaled by this factor before capping.
pub const KEYWORD_SCORE_SCALE: f32 = 0.1;

/// Upper bound of the scaled keyword component.
pub const KEYWORD_SCORE_CAP: f32 = 1.0;

/// Weight of the keyword component for records without an exact match.
///
/// Only reachable when a record is missing from the keyword pass, in which
/// case its keyword component is zero. Kept so the fusion formula stays
/// explicit.
pub const KEYWORD_WEIGHT: f32 = 2.0;

// =============================================================================
// Embedding
// =============================================================================

/// Texts per provider call during bulk embedding.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 100;

/// Pause between consecutive embedding batches (fixed-delay backpressure).
pub const DEFAULT_BATCH_DELAY_MS: u64 = 50;

/// Text embedded to learn the live model's output dimension.
pub const DIMENSION_PROBE_TEXT: &str = "dimension_check";

/// Tunable engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Result count used by `search_default`
    pub top_k_results: usize,
    /// Texts per embedding batch
    pub embed_batch_size: usize,
    /// Pacing strategy between embedding batches
    pub backpressure: BackpressureConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_k_results: DEFAULT_TOP_K,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            backpressure: BackpressureConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.embed_batch_size == 0 {
            return Err(EngineError::InvalidInput(
                "embed_batch_size must be at least 1".to_string(),
            ));
        }
        self.backpressure
            .validate()
            .map_err(|e| EngineError::InvalidInput(e.to_string()))
    }
}
