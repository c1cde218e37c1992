use serde::{Deserialize, Serialize};

use credo_common::utils::{rate, running_average};

use crate::model::ResolutionStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileMetrics {
    pub total_conflicts: u64,
    pub resolved: u64,
    pub failed: u64,
    pub arbitration: u64,
    pub resolution_rate: f64,
    /// `(failed + arbitration) / total`.
    pub unresolved_rate: f64,
    pub average_resolution_ms: f64,
    pub passes: u64,
    /// Sticky until `clear()`.
    pub degraded: bool,
    pub last_updated: u64,
}

impl ReconcileMetrics {
    pub(crate) fn record(&mut self, status: ResolutionStatus, duration_ms: u64, now: u64) {
        self.average_resolution_ms = running_average(self.average_resolution_ms, self.total_conflicts, duration_ms as f64);
        self.total_conflicts += 1;
        match status {
            ResolutionStatus::Resolved => self.resolved += 1,
            ResolutionStatus::Failed => self.failed += 1,
            ResolutionStatus::Arbitration => self.arbitration += 1,
            ResolutionStatus::Pending | ResolutionStatus::Resolving => {}
        }
        self.resolution_rate = rate(self.resolved, self.total_conflicts);
        self.unresolved_rate = rate(self.failed + self.arbitration, self.total_conflicts);
        self.last_updated = now;
    }

    pub(crate) fn check_degraded(&mut self, threshold: f64) -> bool {
        if !self.degraded && self.unresolved_rate > threshold {
            self.degraded = true;
            return true;
        }
        false
    }
}
