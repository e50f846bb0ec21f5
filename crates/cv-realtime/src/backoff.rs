//! Reconnection strategies.
//!
//! A [`ReconnectionStrategy`] decides how long the coordinator waits before
//! the next connect attempt and when it should stop retrying altogether.
//! Attempts are numbered from 1 (the first retry after a failure).
//!
//! Two policies are provided:
//!
//! 1. [`ExponentialBackoff`]: `initial × multiplier^(attempt−1)`, capped at a
//!    maximum, with downward jitter drawn from a seeded RNG.
//! 2. [`FixedBackoff`]: the same delay for every attempt.

use std::time::Duration;

use cv_core::config::BackoffConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Policy computing reconnect delays and the give-up threshold.
pub trait ReconnectionStrategy: Send {
    /// Delay before connect attempt number `attempt`.
    ///
    /// Never negative, never above the configured maximum, and
    /// non-decreasing in expectation as `attempt` grows.
    fn next_delay(&mut self, attempt: u32) -> Duration;

    /// Whether to stop retrying after `attempt` consecutive failures.
    fn should_fallback(&self, attempt: u32) -> bool;

    /// Clear internal state. Afterwards the strategy behaves exactly like a
    /// freshly constructed one.
    fn reset(&mut self);
}

impl<S: ReconnectionStrategy + ?Sized> ReconnectionStrategy for Box<S> {
    fn next_delay(&mut self, attempt: u32) -> Duration {
        (**self).next_delay(attempt)
    }

    fn should_fallback(&self, attempt: u32) -> bool {
        (**self).should_fallback(attempt)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

// ---------------------------------------------------------------------------
// ExponentialBackoff
// ---------------------------------------------------------------------------

/// Exponential backoff with jitter.
///
/// Jitter only ever shortens the capped delay (`capped × (1 − jitter × u)`,
/// `u ∈ [0, 1)`), so the maximum is a hard bound.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: f64,
    fallback_after: u32,
    seed: u64,
    rng: StdRng,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64, fallback_after: u32, seed: u64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: multiplier.max(1.0),
            jitter: jitter.clamp(0.0, 1.0),
            fallback_after: fallback_after.max(1),
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build from the JSON config block. A missing seed is derived from the
    /// clock once; `reset()` reuses it.
    pub fn from_config(cfg: &BackoffConfig) -> Self {
        let seed = cfg.seed.unwrap_or_else(cv_core::time_util::now_ns);
        Self::new(
            cfg.effective_initial_delay(),
            cfg.effective_max_delay(),
            cfg.effective_multiplier(),
            cfg.effective_jitter(),
            cfg.effective_fallback_after(),
            seed,
        )
    }

    /// The delay before jitter is applied.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let base_ms = self.initial.as_millis() as f64 * self.multiplier.powi(exponent.min(i32::MAX as u32) as i32);
        let capped_ms = base_ms.min(self.max.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    pub fn max_delay(&self) -> Duration {
        self.max
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        let delay = if self.jitter > 0.0 {
            let shave = self.jitter * self.rng.gen_range(0.0..1.0);
            capped.mul_f64(1.0 - shave)
        } else {
            capped
        };
        debug!("[backoff] attempt {attempt}: {delay:?} (cap {capped:?})");
        delay
    }

    fn should_fallback(&self, attempt: u32) -> bool {
        attempt >= self.fallback_after
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

// ---------------------------------------------------------------------------
// FixedBackoff
// ---------------------------------------------------------------------------

/// Constant delay between attempts. Stateless, so `reset()` is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    delay: Duration,
    fallback_after: u32,
}

impl FixedBackoff {
    pub fn new(delay: Duration, fallback_after: u32) -> Self {
        Self { delay, fallback_after: fallback_after.max(1) }
    }
}

impl ReconnectionStrategy for FixedBackoff {
    fn next_delay(&mut self, _attempt: u32) -> Duration {
        self.delay
    }

    fn should_fallback(&self, attempt: u32) -> bool {
        attempt >= self.fallback_after
    }

    fn reset(&mut self) {}
}
