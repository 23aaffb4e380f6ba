//! Pacing between embedding batches.
//!
//! Bulk embedding sends batches back to back; providers with rate limits need
//! them spread out. The strategy is picked by [`BackpressureConfig`] and
//! applied by the embedding client before each batch.

use crate::config::DEFAULT_BATCH_DELAY_MS;
use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Slowest accepted token bucket refill rate: one batch per 1000 seconds.
pub const MIN_REFILL_PER_SEC: f64 = 0.001;

/// Upper bound on a single token bucket wait.
const MAX_TOKEN_WAIT: Duration = Duration::from_secs(3600);

/// Serialisable backpressure strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackpressureConfig {
    /// Send batches back to back
    None,
    /// Sleep before every batch except the first
    FixedDelay { delay_ms: u64 },
    /// Each batch consumes one token; wait for refill when the bucket is empty
    TokenBucket { capacity: u32, refill_per_sec: f64 },
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        BackpressureConfig::FixedDelay {
            delay_ms: DEFAULT_BATCH_DELAY_MS,
        }
    }
}

impl BackpressureConfig {
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        match self {
            BackpressureConfig::TokenBucket { capacity, .. } if *capacity == 0 => Err(
                EmbeddingError::InvalidConfig("token bucket capacity must be at least 1".into()),
            ),
            BackpressureConfig::TokenBucket { refill_per_sec, .. }
                if !(refill_per_sec.is_finite() && *refill_per_sec >= MIN_REFILL_PER_SEC) =>
            {
                Err(EmbeddingError::InvalidConfig(format!(
                    "token bucket refill rate must be at least {} per second",
                    MIN_REFILL_PER_SEC
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Runtime form of [`BackpressureConfig`].
#[derive(Debug)]
pub enum Throttle {
    Unlimited,
    FixedDelay(Duration),
    TokenBucket(Mutex<TokenBucket>),
}

impl Throttle {
    pub fn from_config(config: &BackpressureConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;
        Ok(match *config {
            BackpressureConfig::None => Throttle::Unlimited,
            BackpressureConfig::FixedDelay { delay_ms } => {
                Throttle::FixedDelay(Duration::from_millis(delay_ms))
            }
            BackpressureConfig::TokenBucket {
                capacity,
                refill_per_sec,
            } => Throttle::TokenBucket(Mutex::new(TokenBucket::new(capacity, refill_per_sec))),
        })
    }

    /// Waits until batch number `batch_index` (0-based) may be sent.
    pub async fn acquire(&self, batch_index: usize) {
        let wait = match self {
            Throttle::Unlimited => None,
            Throttle::FixedDelay(delay) => (batch_index > 0 && !delay.is_zero()).then_some(*delay),
            Throttle::TokenBucket(bucket) => bucket
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .reserve(Instant::now()),
        };

        if let Some(wait) = wait {
            debug!("Backpressure: waiting {:?} before batch {}", wait, batch_index + 1);
            tokio::time::sleep(wait).await;
        }
    }
}

/// Classic token bucket with reservation.
///
/// A caller that finds the bucket empty still takes its token (the balance
/// goes negative) and is told how long to wait, so concurrent callers queue
/// up behind each other instead of racing for the same refill.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket.
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity as f64,
            tokens: capacity as f64,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Takes one token, returning how long the caller must wait first.
    pub fn reserve(&mut self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            None
        } else {
            let wait = Duration::try_from_secs_f64(-self.tokens / self.refill_per_sec)
                .unwrap_or(MAX_TOKEN_WAIT);
            Some(wait.min(MAX_TOKEN_WAIT))
        }
    }
}
