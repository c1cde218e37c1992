use std::fmt;

use serde::{Deserialize, Serialize};

use credo_common::{random::RandomSource, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Validator,
    Witness,
    Archive,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeKind::Validator => "validator",
            NodeKind::Witness => "witness",
            NodeKind::Archive => "archive",
        };
        write!(f, "{}", label)
    }
}

/// Static description of a roster member, as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub kind: NodeKind,
    pub capacity: u32,
    pub load: u32,
    /// Probability that the node answers a given sync round.
    pub uptime: f64,
}

impl NodeSpec {
    pub fn new(id: &str, kind: NodeKind, capacity: u32, load: u32, uptime: f64) -> Self {
        Self { id: NodeId::new(id), kind, capacity, load, uptime }
    }

    /// Five nodes; `witness-2` is the flaky one with ~80% uptime.
    pub fn default_roster() -> Vec<NodeSpec> {
        vec![
            NodeSpec::new("validator-1", NodeKind::Validator, 100, 20, 1.0),
            NodeSpec::new("validator-2", NodeKind::Validator, 100, 35, 1.0),
            NodeSpec::new("witness-1", NodeKind::Witness, 50, 10, 1.0),
            NodeSpec::new("witness-2", NodeKind::Witness, 50, 25, 0.8),
            NodeSpec::new("archive-1", NodeKind::Archive, 200, 60, 1.0),
        ]
    }
}

/// Runtime state of a simulated node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimNode {
    pub spec: NodeSpec,
    /// Operator switch; a disabled node never comes online.
    pub enabled: bool,
    /// Availability observed at the most recent sync round.
    pub online: bool,
}

impl SimNode {
    pub fn new(spec: NodeSpec) -> Self {
        Self { spec, enabled: true, online: true }
    }

    pub fn id(&self) -> &NodeId {
        &self.spec.id
    }

    /// Current load as a fraction of capacity, clamped to `[0, 1]`.
    pub fn load_ratio(&self) -> f64 {
        if self.spec.capacity == 0 {
            return 1.0;
        }
        (self.spec.load as f64 / self.spec.capacity as f64).clamp(0.0, 1.0)
    }

    /// Re-rolls availability for a new round.
    pub fn refresh(&mut self, rng: &dyn RandomSource) -> bool {
        self.online = self.enabled && rng.chance(self.spec.uptime);
        self.online
    }
}
