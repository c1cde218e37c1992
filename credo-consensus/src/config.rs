use serde::{Deserialize, Serialize};

use crate::nodes::NodeSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound of the quorum: `min(required_nodes, ceil(participants / 2))`.
    pub required_nodes: usize,
    /// At most this many online nodes take part in one round.
    pub max_participants: usize,
    pub base_accept_rate: f64,
    /// Subtracted from the accept rate in proportion to a node's load ratio.
    pub load_penalty: f64,
    /// Added to the accept rate for `verify` and `consensus` syncs.
    pub verify_bonus: f64,
    /// Failure rate above which the coordinator enters degraded mode.
    pub failure_threshold: f64,
    pub node_latency_ms: (u64, u64),
    pub ledger_capacity: usize,
    pub log_capacity: usize,
    pub roster: Vec<NodeSpec>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            required_nodes: 3,
            max_participants: 5,
            base_accept_rate: 0.92,
            load_penalty: 0.3,
            verify_bonus: 0.05,
            failure_threshold: 0.20,
            node_latency_ms: (5, 25),
            ledger_capacity: 500,
            log_capacity: 2_000,
            roster: NodeSpec::default_roster(),
        }
    }
}

impl SyncConfig {
    /// No simulated latency.
    pub fn deterministic() -> Self {
        Self { node_latency_ms: (0, 0), ..Self::default() }
    }
}
