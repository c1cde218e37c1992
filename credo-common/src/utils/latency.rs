use std::time::Duration;

use crate::random::RandomSource;

/// Sleeps for a synthetic network delay drawn from `[min_ms, max_ms]`.
///
/// `(0, 0)` returns immediately, which is what tests configure.
pub async fn simulate_latency(rng: &dyn RandomSource, (min_ms, max_ms): (u64, u64)) {
    let ms = rng.range_u64(min_ms, max_ms);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
