use std::fmt;

use serde::{Deserialize, Serialize};

use credo_common::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Upload,
    Download,
    Verify,
    Consensus,
}

impl SyncKind {
    /// Kinds that earn the acceptance bonus.
    pub fn is_verification(&self) -> bool {
        matches!(self, SyncKind::Verify | SyncKind::Consensus)
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncKind::Upload => "upload",
            SyncKind::Download => "download",
            SyncKind::Verify => "verify",
            SyncKind::Consensus => "consensus",
        };
        write!(f, "{}", label)
    }
}

/// `pending → syncing → completed | failed`. Finished states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed)
    }

    pub fn can_transition_to(&self, next: SyncStatus) -> bool {
        use SyncStatus::*;
        matches!(
            (self, next),
            (Pending, Syncing) | (Pending, Failed) | (Syncing, Completed) | (Syncing, Failed)
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSignature {
    pub node_id: NodeId,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResponse {
    pub node_id: NodeId,
    pub accepted: bool,
    pub latency_ms: u64,
}

/// One propagation of a credential to the node roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub id: String,
    pub proof_digest: String,
    pub source_id: String,
    pub target_id: String,
    pub kind: SyncKind,
    pub status: SyncStatus,
    pub attempts: u32,
    pub participating_nodes: usize,
    /// Number of nodes that accepted.
    pub consensus_nodes: usize,
    /// Quorum that applied to this round.
    pub required_nodes: usize,
    pub consensus_reached: bool,
    pub zkp_verified: bool,
    pub node_responses: Vec<NodeResponse>,
    pub node_signatures: Vec<NodeSignature>,
    pub cid: Option<String>,
    pub error: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl SyncEntry {
    pub fn new(id: String, proof_digest: &str, source_id: &str, target_id: &str, kind: SyncKind, now: u64) -> Self {
        Self {
            id,
            proof_digest: proof_digest.to_string(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            kind,
            status: SyncStatus::Pending,
            attempts: 0,
            participating_nodes: 0,
            consensus_nodes: 0,
            required_nodes: 0,
            consensus_reached: false,
            zkp_verified: false,
            node_responses: Vec::new(),
            node_signatures: Vec::new(),
            cid: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next` if the transition is legal. Returns `false` (and leaves
    /// the entry untouched) otherwise.
    pub fn advance(&mut self, next: SyncStatus, now: u64) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_monotonic() {
        let mut entry = SyncEntry::new("e1".into(), "d", "s", "t", SyncKind::Upload, 1);
        assert!(entry.advance(SyncStatus::Syncing, 2));
        assert!(!entry.advance(SyncStatus::Pending, 3));
        assert!(entry.advance(SyncStatus::Completed, 4));
        assert!(!entry.advance(SyncStatus::Failed, 5));
        assert!(!entry.advance(SyncStatus::Pending, 6));
        assert_eq!(entry.status, SyncStatus::Completed);
        assert_eq!(entry.updated_at, 4);
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let mut entry = SyncEntry::new("e2".into(), "d", "s", "t", SyncKind::Verify, 1);
        assert!(entry.advance(SyncStatus::Failed, 2));
        assert!(entry.status.is_final());
    }

    #[test]
    fn test_verification_kinds() {
        assert!(SyncKind::Verify.is_verification());
        assert!(SyncKind::Consensus.is_verification());
        assert!(!SyncKind::Upload.is_verification());
        assert_eq!(serde_json::to_string(&SyncKind::Download).unwrap(), "\"download\"");
    }
}
