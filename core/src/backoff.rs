//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before the retry that follows the failed attempt `attempt`.
///
/// `base_interval_ms * 2^attempt` plus a uniform jitter in
/// `[0, max_jitter_ms)`. Arithmetic saturates instead of overflowing for
/// absurd attempt counts.
pub fn delay(attempt: u32, base_interval_ms: u64, max_jitter_ms: u64) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    let exponential = base_interval_ms.saturating_mul(factor);

    let jitter = if max_jitter_ms > 0 {
        rand::thread_rng().gen_range(0..max_jitter_ms)
    } else {
        0
    };

    Duration::from_millis(exponential.saturating_add(jitter))
}
