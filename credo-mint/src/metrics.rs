use serde::{Deserialize, Serialize};

use credo_common::utils::{rate, running_average};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MintMetrics {
    pub total_mints: u64,
    pub successful_mints: u64,
    pub failed_mints: u64,
    /// Mints satisfied through the fallback store. Also counted as failed.
    pub fallback_mints: u64,
    pub average_latency_ms: f64,
    pub success_rate: f64,
    pub failure_rate: f64,
    /// Sticky: once raised it stays raised until `clear()`.
    pub degraded: bool,
    pub last_updated: u64,
}

impl MintMetrics {
    pub(crate) fn record(&mut self, success: bool, duration_ms: u64, now: u64) {
        self.average_latency_ms = running_average(self.average_latency_ms, self.total_mints, duration_ms as f64);
        self.total_mints += 1;
        if success {
            self.successful_mints += 1;
        } else {
            self.failed_mints += 1;
        }
        self.success_rate = rate(self.successful_mints, self.total_mints);
        self.failure_rate = rate(self.failed_mints, self.total_mints);
        self.last_updated = now;
    }

    /// Raises the degraded flag if the failure rate is above `threshold`.
    /// Returns `true` only on the transition.
    pub(crate) fn check_degraded(&mut self, threshold: f64) -> bool {
        if !self.degraded && self.failure_rate > threshold {
            self.degraded = true;
            return true;
        }
        false
    }
}
