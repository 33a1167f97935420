//! Bounded exponential backoff for post-signing ledger re-queries.

use rand::Rng;
use std::time::Duration;

use crate::config::ValidationConfig;

/// Delay before re-query `attempt` of a signed transaction's effect.
///
/// The first check runs immediately. Re-query `n` waits `base * 2^(n-1)`,
/// capped at `max`, plus up to 10% jitter so concurrent sessions spread out.
pub fn requery_delay(attempt: u32, config: &ValidationConfig) -> Duration {
    let Some(exponent) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let capped = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(config.max_delay_ms);
    Duration::from_millis(capped + jitter(capped / 10))
}

fn jitter(range_ms: u64) -> u64 {
    if range_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..range_ms)
}
