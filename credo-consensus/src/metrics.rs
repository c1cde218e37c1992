use serde::{Deserialize, Serialize};

use credo_common::utils::{rate, running_average};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetrics {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    /// Over successful syncs only.
    pub average_sync_ms: f64,
    /// Average participating node count over successful syncs.
    pub average_node_count: f64,
    pub failure_rate: f64,
    /// Sticky until `clear()`.
    pub degraded: bool,
    /// Offline nodes observed in the most recent round.
    pub offline_nodes: usize,
    pub last_updated: u64,
}

impl SyncMetrics {
    pub(crate) fn record_success(&mut self, duration_ms: u64, participants: usize, now: u64) {
        self.average_sync_ms = running_average(self.average_sync_ms, self.successful_syncs, duration_ms as f64);
        self.average_node_count = running_average(self.average_node_count, self.successful_syncs, participants as f64);
        self.successful_syncs += 1;
        self.total_syncs += 1;
        self.refresh(now);
    }

    pub(crate) fn record_failure(&mut self, now: u64) {
        self.failed_syncs += 1;
        self.total_syncs += 1;
        self.refresh(now);
    }

    fn refresh(&mut self, now: u64) {
        self.failure_rate = rate(self.failed_syncs, self.total_syncs);
        self.last_updated = now;
    }

    /// Raises the flag when the failure rate is above `threshold`. Returns
    /// `true` only on the transition.
    pub(crate) fn check_degraded(&mut self, threshold: f64) -> bool {
        if !self.degraded && self.failure_rate > threshold {
            self.degraded = true;
            return true;
        }
        false
    }
}

/// Diagnostic snapshot written to the fallback store, either when degraded
/// mode is entered or when a sync fails while already degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncFallbackRecord {
    pub id: String,
    pub entry_id: Option<String>,
    pub proof_digest: Option<String>,
    pub failure_rate: f64,
    pub offline_nodes: usize,
    pub reason: String,
    pub timestamp: u64,
    pub path_b_triggered: bool,
}
