use std::fmt;

use serde::{Deserialize, Serialize};

use credo_common::NodeId;

/// Which independently maintained store a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStore {
    SyncLog,
    ExportHistory,
    Vault,
}

/// One store's view of a credential, normalized for comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub record_id: String,
    pub store: SourceStore,
    pub credential_ref: String,
    pub proof_digest: String,
    pub status: String,
    pub cid: Option<String>,
    pub verified: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    HashMismatch,
    StateDivergence,
    CidInconsistency,
    /// At least one store holds an unverified copy.
    NodeDisagreement,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConflictKind::HashMismatch => "hash_mismatch",
            ConflictKind::StateDivergence => "state_divergence",
            ConflictKind::CidInconsistency => "cid_inconsistency",
            ConflictKind::NodeDisagreement => "node_disagreement",
        };
        write!(f, "{}", label)
    }
}

/// `pending → resolving → resolved | failed | arbitration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Pending,
    Resolving,
    Resolved,
    Failed,
    Arbitration,
}

impl ResolutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolutionStatus::Resolved | ResolutionStatus::Failed | ResolutionStatus::Arbitration)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, ResolutionStatus::Failed | ResolutionStatus::Arbitration)
    }

    pub fn can_transition_to(&self, next: ResolutionStatus) -> bool {
        use ResolutionStatus::*;
        matches!((self, next), (Pending, Resolving) | (Resolving, Resolved) | (Resolving, Failed) | (Resolving, Arbitration))
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolutionStatus::Pending => "pending",
            ResolutionStatus::Resolving => "resolving",
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::Failed => "failed",
            ResolutionStatus::Arbitration => "arbitration",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Accept,
    Reject,
    Abstain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVote {
    pub node_id: NodeId,
    pub vote: Vote,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revalidation {
    /// Digest the credential was minted with.
    pub original_digest: String,
    /// Most frequent digest among the divergent sources.
    pub recomputed_digest: String,
    pub majority_confirmed: bool,
    pub valid: bool,
    pub validators: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub id: String,
    pub credential_ref: String,
    pub kind: ConflictKind,
    pub detected_sources: Vec<SourceRecord>,
    pub status: ResolutionStatus,
    /// Set exactly when `status` is `Resolved`.
    pub winning_entry: Option<SourceRecord>,
    pub rejected: Vec<SourceRecord>,
    pub votes: Vec<NodeVote>,
    pub revalidation: Option<Revalidation>,
    pub pushed_to_fallback: bool,
    pub path_b_triggered: bool,
    pub detected_at: u64,
    pub resolved_at: Option<u64>,
    pub resolution_ms: Option<u64>,
}

impl ConflictEntry {
    pub fn new(id: String, credential_ref: &str, kind: ConflictKind, detected_sources: Vec<SourceRecord>, now: u64) -> Self {
        Self {
            id,
            credential_ref: credential_ref.to_string(),
            kind,
            detected_sources,
            status: ResolutionStatus::Pending,
            winning_entry: None,
            rejected: Vec::new(),
            votes: Vec::new(),
            revalidation: None,
            pushed_to_fallback: false,
            path_b_triggered: false,
            detected_at: now,
            resolved_at: None,
            resolution_ms: None,
        }
    }

    pub fn advance(&mut self, next: ResolutionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// Sorted record ids of the detected sources.
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.detected_sources.iter().map(|s| s.record_id.clone()).collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_state_machine() {
        let mut entry = ConflictEntry::new("c".into(), "d", ConflictKind::HashMismatch, vec![], 0);
        assert!(!entry.advance(ResolutionStatus::Resolved), "must pass through resolving");
        assert!(entry.advance(ResolutionStatus::Resolving));
        assert!(entry.advance(ResolutionStatus::Arbitration));
        assert!(entry.status.is_terminal());
        assert!(!entry.advance(ResolutionStatus::Resolved));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ConflictKind::CidInconsistency.to_string(), "cid_inconsistency");
        assert_eq!(serde_json::to_string(&ConflictKind::HashMismatch).unwrap(), "\"hash_mismatch\"");
    }
}
