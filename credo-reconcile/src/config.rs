use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Size of the voting committee.
    pub voter_count: usize,
    /// Probability that a committee member casts a vote.
    pub participation_rate: f64,
    /// Probability of an accept vote when revalidation confirmed the digest.
    pub accept_bias: f64,
    /// Probability that the revalidated proof checks out.
    pub proof_validity_rate: f64,
    /// Validators taking part in revalidation.
    pub validators: usize,
    /// `(failed + arbitration) / total` above which degraded mode is entered.
    pub unresolved_threshold: f64,
    /// Advisory budget for one resolution.
    pub resolution_budget_ms: u64,
    /// Advisory budget for one detect-and-resolve pass.
    pub pass_budget_ms: u64,
    pub conflict_capacity: usize,
    pub latency_ms: (u64, u64),
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            voter_count: 5,
            participation_rate: 0.9,
            accept_bias: 0.85,
            proof_validity_rate: 0.95,
            validators: 3,
            unresolved_threshold: 0.10,
            resolution_budget_ms: 150,
            pass_budget_ms: 2_000,
            conflict_capacity: 200,
            latency_ms: (5, 20),
        }
    }
}

impl ReconcileConfig {
    pub fn deterministic() -> Self {
        Self { latency_ms: (0, 0), ..Self::default() }
    }
}
