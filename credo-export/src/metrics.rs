use serde::{Deserialize, Serialize};

use credo_common::utils::{rate, running_average};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportMetrics {
    pub total_exports: u64,
    pub successful_exports: u64,
    pub failed_exports: u64,
    /// Successful exports that produced a mock bundle.
    pub mock_exports: u64,
    pub average_export_ms: f64,
    pub average_bundle_bytes: f64,
    pub average_entry_count: f64,
    pub dropped_unverified: u64,
    pub success_rate: f64,
    pub last_updated: u64,
}

impl ExportMetrics {
    pub(crate) fn record_success(&mut self, duration_ms: u64, bytes: usize, entries: usize, mock: bool, now: u64) {
        let n = self.successful_exports;
        self.average_export_ms = running_average(self.average_export_ms, n, duration_ms as f64);
        self.average_bundle_bytes = running_average(self.average_bundle_bytes, n, bytes as f64);
        self.average_entry_count = running_average(self.average_entry_count, n, entries as f64);
        self.successful_exports += 1;
        if mock {
            self.mock_exports += 1;
        }
        self.total_exports += 1;
        self.success_rate = rate(self.successful_exports, self.total_exports);
        self.last_updated = now;
    }

    pub(crate) fn record_failure(&mut self, now: u64) {
        self.failed_exports += 1;
        self.total_exports += 1;
        self.success_rate = rate(self.successful_exports, self.total_exports);
        self.last_updated = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_averages() {
        let mut m = ExportMetrics::default();
        m.record_success(10, 100, 2, false, 1);
        m.record_success(30, 300, 4, true, 2);
        m.record_failure(3);

        assert!((m.average_bundle_bytes - 200.0).abs() < 1e-9);
        assert!((m.average_entry_count - 3.0).abs() < 1e-9);
        assert_eq!(m.mock_exports, 1);
        assert!((m.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }
}
