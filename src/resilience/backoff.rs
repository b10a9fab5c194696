//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based).
///
/// Doubles from `base` per attempt, capped at `max`, plus up to 10% jitter so
/// that pumps failing together do not retry in lockstep.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 || base.is_zero() {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(31));
    let capped = base.saturating_mul(factor).min(max);

    let jitter_range = capped.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped + Duration::from_millis(jitter)
}
