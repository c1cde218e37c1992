use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MintConfig {
    /// Oldest records are evicted past this many entries.
    pub history_capacity: usize,
    /// Failure rate above which the authority enters degraded mode.
    pub failure_threshold: f64,
    /// Probability that an otherwise valid mint fails, to exercise the fallback path.
    pub injected_failure_rate: f64,
    /// Simulated issuance latency range in milliseconds.
    pub latency_ms: (u64, u64),
    /// Issuer recorded when the caller does not supply one.
    pub default_issuer: String,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            history_capacity: 200,
            failure_threshold: 0.10,
            injected_failure_rate: 0.05,
            latency_ms: (5, 20),
            default_issuer: "did:credo:mint-authority".to_string(),
        }
    }
}

impl MintConfig {
    /// No latency and no injected failures.
    pub fn deterministic() -> Self {
        Self {
            injected_failure_rate: 0.0,
            latency_ms: (0, 0),
            ..Self::default()
        }
    }
}
