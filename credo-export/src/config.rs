use serde::{Deserialize, Serialize};

pub const MAX_BUNDLE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Hard cap on the serialized size of a bundle's entries.
    pub max_bundle_bytes: usize,
    /// Probability that a record passes the simulated proof check.
    pub verification_pass_rate: f64,
    /// Probability that a record passes the simulated node sync check.
    pub node_sync_success_rate: f64,
    /// Fraction of node sync failures above which a mock bundle is produced.
    pub node_sync_failure_threshold: f64,
    pub history_capacity: usize,
    pub latency_ms: (u64, u64),
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_bundle_bytes: MAX_BUNDLE_BYTES,
            verification_pass_rate: 0.9,
            node_sync_success_rate: 0.95,
            node_sync_failure_threshold: 0.10,
            history_capacity: 500,
            latency_ms: (10, 40),
        }
    }
}

impl ExportConfig {
    pub fn deterministic() -> Self {
        Self { latency_ms: (0, 0), ..Self::default() }
    }
}
