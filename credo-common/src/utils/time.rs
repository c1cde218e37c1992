use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current UNIX timestamp in seconds.
pub fn current_time() -> u64 {
    current_time_millis() / 1000
}

/// Returns the current UNIX timestamp in milliseconds.
///
/// Issuance times, sync completion and export timestamps all use this
/// resolution so that two mints of identical input a millisecond apart still
/// produce distinct proof digests. A clock set before the epoch reads as `0`.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
