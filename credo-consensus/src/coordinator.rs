use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use credo_common::{
    crypto::{derive_cid, digest},
    error::{CredoError, Result},
    random::RandomSource,
    storage::{keys, load_collection, persist, KvStore},
    utils::{current_time_millis, simulate_latency},
    NodeId,
};
use credo_mint::MintAuthority;

use crate::{
    config::SyncConfig,
    entry::{NodeResponse, NodeSignature, SyncEntry, SyncKind, SyncStatus},
    log::{LogRecordKind, SyncLog, SyncLogRecord},
    metrics::{SyncFallbackRecord, SyncMetrics},
    nodes::SimNode,
};

/// Outcome of one [`ConsensusSyncCoordinator::sync`] call. Failures are
/// reported here rather than as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub proof_digest: String,
    pub status: SyncStatus,
    pub consensus_reached: bool,
    pub nodes_participated: usize,
    pub consensus_nodes: usize,
    pub required_nodes: usize,
    pub cid: Option<String>,
    pub error: Option<String>,
    /// The failure was mirrored to the fallback store.
    pub path_b_triggered: bool,
    pub duration_ms: u64,
    /// Absent when the pipeline stopped before an entry was built.
    pub entry: Option<SyncEntry>,
}

/// Quorum needed for `participants` nodes: `min(required, ceil(participants / 2))`.
pub fn quorum_threshold(required_nodes: usize, participants: usize) -> usize {
    required_nodes.min(participants.div_ceil(2))
}

/// Offers minted credentials to the simulated roster and records the outcome.
pub struct ConsensusSyncCoordinator {
    config: SyncConfig,
    mint: Arc<MintAuthority>,
    store: Arc<dyn KvStore>,
    rng: Arc<dyn RandomSource>,
    nodes: RwLock<Vec<SimNode>>,
    ledger: RwLock<VecDeque<SyncEntry>>,
    log: RwLock<SyncLog>,
    metrics: RwLock<SyncMetrics>,
    fallback: RwLock<Vec<SyncFallbackRecord>>,
}

impl ConsensusSyncCoordinator {
    pub fn new(
        config: SyncConfig,
        mint: Arc<MintAuthority>,
        store: Arc<dyn KvStore>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let nodes = config.roster.iter().cloned().map(SimNode::new).collect();
        let ledger: VecDeque<SyncEntry> = load_collection(store.as_ref(), keys::SYNC_LEDGER);
        let log: SyncLog = load_collection(store.as_ref(), keys::SYNC_LOG);
        let metrics: SyncMetrics = load_collection(store.as_ref(), keys::SYNC_METRICS);
        let fallback: Vec<SyncFallbackRecord> = load_collection(store.as_ref(), keys::SYNC_FALLBACK);

        if !ledger.is_empty() || !log.is_empty() {
            info!("📂 Restored {} ledger entries and {} log records", ledger.len(), log.len());
        }

        Self {
            config,
            mint,
            store,
            rng,
            nodes: RwLock::new(nodes),
            ledger: RwLock::new(ledger),
            log: RwLock::new(log),
            metrics: RwLock::new(metrics),
            fallback: RwLock::new(fallback),
        }
    }

    /// Syncs the credential identified by `proof_digest` to the online nodes.
    ///
    /// Never fails: a missing credential or a missed quorum comes back as a
    /// failed [`SyncResult`] and counts towards the failure rate.
    pub async fn sync(&self, proof_digest: &str, source_id: &str, target_id: &str, kind: SyncKind) -> SyncResult {
        let started = Instant::now();
        let was_degraded = self.is_degraded().await;

        if self.mint.find_credential(proof_digest).await.is_none() {
            let err = CredoError::CredentialNotFound(proof_digest.to_string());
            warn!("❌ Sync aborted: {}", err);
            return self.finish_without_entry(proof_digest, err, was_degraded, started).await;
        }

        let now = current_time_millis();
        let mut entry = SyncEntry::new(Uuid::new_v4().to_string(), proof_digest, source_id, target_id, kind, now);
        entry.attempts = 1;
        entry.advance(SyncStatus::Syncing, now);

        let (participants, offline) = self.select_participants().await;
        entry.participating_nodes = participants.len();
        entry.required_nodes = quorum_threshold(self.config.required_nodes, participants.len());

        debug!(
            "📡 Sync {} ({}) offered to {} nodes, {} offline",
            entry.id, kind, participants.len(), offline
        );

        let responses = join_all(participants.iter().map(|node| self.ask_node(node, kind))).await;
        for response in responses {
            if response.accepted {
                entry.node_signatures.push(NodeSignature {
                    signature: node_signature(&response.node_id, &entry.id, proof_digest),
                    node_id: response.node_id.clone(),
                });
            }
            entry.node_responses.push(response);
        }
        entry.consensus_nodes = entry.node_signatures.len();
        entry.consensus_reached = entry.participating_nodes > 0 && entry.consensus_nodes >= entry.required_nodes;

        let now = current_time_millis();
        if entry.consensus_reached {
            entry.zkp_verified = true;
            entry.cid = match entry_cid(&entry) {
                Ok(cid) => Some(cid),
                Err(e) => {
                    warn!("⚠️ Could not derive CID for sync {}: {}", entry.id, e);
                    None
                }
            };
            entry.advance(SyncStatus::Completed, now);
        } else {
            let err = CredoError::ConsensusFailure(format!(
                "{}/{} acceptances from {} participants",
                entry.consensus_nodes, entry.required_nodes, entry.participating_nodes
            ));
            entry.error = Some(err.kind().to_string());
            entry.advance(SyncStatus::Failed, now);
            warn!("❌ Sync {} failed: {}", entry.id, err);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        self.append_log(sync_log_record(&entry)).await;
        self.push_ledger(entry.clone()).await;

        let mut path_b_triggered = false;
        {
            let mut metrics = self.metrics.write().await;
            metrics.offline_nodes = offline;
            if entry.consensus_reached {
                metrics.record_success(duration_ms, entry.participating_nodes, now);
            } else {
                metrics.record_failure(now);
            }
            if metrics.check_degraded(self.config.failure_threshold) {
                warn!(
                    "🚨 Sync failure rate {:.1}% above {:.1}%: degraded mode enabled",
                    metrics.failure_rate * 100.0,
                    self.config.failure_threshold * 100.0
                );
                self.push_fallback(SyncFallbackRecord {
                    id: Uuid::new_v4().to_string(),
                    entry_id: Some(entry.id.clone()),
                    proof_digest: Some(proof_digest.to_string()),
                    failure_rate: metrics.failure_rate,
                    offline_nodes: offline,
                    reason: "DegradedModeEntered".to_string(),
                    timestamp: now,
                    path_b_triggered: false,
                })
                .await;
            } else if was_degraded && !entry.consensus_reached {
                path_b_triggered = true;
                self.push_fallback(SyncFallbackRecord {
                    id: Uuid::new_v4().to_string(),
                    entry_id: Some(entry.id.clone()),
                    proof_digest: Some(proof_digest.to_string()),
                    failure_rate: metrics.failure_rate,
                    offline_nodes: offline,
                    reason: entry.error.clone().unwrap_or_default(),
                    timestamp: now,
                    path_b_triggered: true,
                })
                .await;
            }
            persist(self.store.as_ref(), keys::SYNC_METRICS, &*metrics);
        }

        if entry.consensus_reached {
            info!(
                "✅ Sync {} committed: {}/{} nodes accepted",
                entry.id, entry.consensus_nodes, entry.participating_nodes
            );
        }
        tracing::info!(
            target: "ledger",
            "EVENT:SYNC entry={} digest={} kind={} status={} accepted={} participants={}",
            entry.id, proof_digest, kind, entry.status, entry.consensus_nodes, entry.participating_nodes
        );

        SyncResult {
            success: entry.consensus_reached,
            proof_digest: proof_digest.to_string(),
            status: entry.status,
            consensus_reached: entry.consensus_reached,
            nodes_participated: entry.participating_nodes,
            consensus_nodes: entry.consensus_nodes,
            required_nodes: entry.required_nodes,
            cid: entry.cid.clone(),
            error: entry.error.clone(),
            path_b_triggered,
            duration_ms,
            entry: Some(entry),
        }
    }

    async fn finish_without_entry(
        &self,
        proof_digest: &str,
        err: CredoError,
        was_degraded: bool,
        started: Instant,
    ) -> SyncResult {
        let now = current_time_millis();
        self.append_log(SyncLogRecord {
            seq: 0,
            record_id: Uuid::new_v4().to_string(),
            kind: LogRecordKind::Sync,
            credential_ref: proof_digest.to_string(),
            proof_digest: proof_digest.to_string(),
            status: SyncStatus::Failed.as_str().to_string(),
            cid: None,
            verified: false,
            consensus_nodes: 0,
            supersedes: Vec::new(),
            timestamp: now,
        })
        .await;

        let mut path_b_triggered = false;
        {
            let mut metrics = self.metrics.write().await;
            metrics.record_failure(now);
            let entered = metrics.check_degraded(self.config.failure_threshold);
            if entered {
                warn!("🚨 Sync failure rate {:.1}%: degraded mode enabled", metrics.failure_rate * 100.0);
            }
            if entered || was_degraded {
                path_b_triggered = was_degraded;
                self.push_fallback(SyncFallbackRecord {
                    id: Uuid::new_v4().to_string(),
                    entry_id: None,
                    proof_digest: Some(proof_digest.to_string()),
                    failure_rate: metrics.failure_rate,
                    offline_nodes: metrics.offline_nodes,
                    reason: err.kind().to_string(),
                    timestamp: now,
                    path_b_triggered,
                })
                .await;
            }
            persist(self.store.as_ref(), keys::SYNC_METRICS, &*metrics);
        }

        SyncResult {
            success: false,
            proof_digest: proof_digest.to_string(),
            status: SyncStatus::Failed,
            consensus_reached: false,
            nodes_participated: 0,
            consensus_nodes: 0,
            required_nodes: 0,
            cid: None,
            error: Some(err.kind().to_string()),
            path_b_triggered,
            duration_ms: started.elapsed().as_millis() as u64,
            entry: None,
        }
    }

    /// Re-rolls availability for the whole roster and returns the online
    /// nodes (capped) together with the offline count.
    async fn select_participants(&self) -> (Vec<SimNode>, usize) {
        let mut nodes = self.nodes.write().await;
        let mut online = Vec::new();
        for node in nodes.iter_mut() {
            if node.refresh(self.rng.as_ref()) {
                online.push(node.clone());
            }
        }
        let offline = nodes.len() - online.len();
        online.truncate(self.config.max_participants);
        (online, offline)
    }

    async fn ask_node(&self, node: &SimNode, kind: SyncKind) -> NodeResponse {
        let started = Instant::now();
        simulate_latency(self.rng.as_ref(), self.config.node_latency_ms).await;

        let bonus = if kind.is_verification() { self.config.verify_bonus } else { 0.0 };
        let p = (self.config.base_accept_rate - node.load_ratio() * self.config.load_penalty + bonus).clamp(0.0, 1.0);
        let accepted = self.rng.chance(p);

        NodeResponse {
            node_id: node.id().clone(),
            accepted,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn append_log(&self, record: SyncLogRecord) {
        let mut log = self.log.write().await;
        log.append(record, self.config.log_capacity);
        persist(self.store.as_ref(), keys::SYNC_LOG, &*log);
    }

    async fn push_ledger(&self, entry: SyncEntry) {
        let mut ledger = self.ledger.write().await;
        ledger.push_back(entry);
        while ledger.len() > self.config.ledger_capacity {
            ledger.pop_front();
        }
        persist(self.store.as_ref(), keys::SYNC_LEDGER, &*ledger);
    }

    async fn push_fallback(&self, record: SyncFallbackRecord) {
        let mut fallback = self.fallback.write().await;
        fallback.push(record);
        persist(self.store.as_ref(), keys::SYNC_FALLBACK, &*fallback);
    }

    /// Appends a reconciliation outcome to the audit log and returns its sequence number.
    pub async fn append_resolution(&self, record: SyncLogRecord) -> u64 {
        tracing::info!(
            target: "ledger",
            "EVENT:SYNC_RESOLUTION credential={} digest={} supersedes={}",
            record.credential_ref, record.proof_digest, record.supersedes.len()
        );
        let mut log = self.log.write().await;
        let seq = log.append(record, self.config.log_capacity);
        persist(self.store.as_ref(), keys::SYNC_LOG, &*log);
        seq
    }

    pub async fn nodes(&self) -> Vec<SimNode> {
        self.nodes.read().await.clone()
    }

    /// Operator switch for a roster member. A disabled node stays offline.
    pub async fn set_node_online(&self, node_id: &NodeId, online: bool) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .iter_mut()
            .find(|n| n.id() == node_id)
            .ok_or_else(|| CredoError::NotFound(node_id.to_string()))?;
        node.enabled = online;
        node.online = online;
        info!("🔌 Node {} switched {}", node_id, if online { "on" } else { "off" });
        Ok(())
    }

    pub async fn set_node_load(&self, node_id: &NodeId, load: u32) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .iter_mut()
            .find(|n| n.id() == node_id)
            .ok_or_else(|| CredoError::NotFound(node_id.to_string()))?;
        node.spec.load = load;
        Ok(())
    }

    /// Most recent ledger entry for `proof_digest`.
    pub async fn latest_entry_for(&self, proof_digest: &str) -> Option<SyncEntry> {
        self.ledger
            .read()
            .await
            .iter()
            .rev()
            .find(|e| e.proof_digest == proof_digest)
            .cloned()
    }

    pub async fn ledger(&self) -> Vec<SyncEntry> {
        self.ledger.read().await.iter().cloned().collect()
    }

    pub async fn log(&self) -> Vec<SyncLogRecord> {
        self.log.read().await.records().cloned().collect()
    }

    pub async fn fallback_snapshots(&self) -> Vec<SyncFallbackRecord> {
        self.fallback.read().await.clone()
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn is_degraded(&self) -> bool {
        self.metrics.read().await.degraded
    }

    /// Resets ledger, log, fallback snapshots, metrics and node switches.
    pub async fn clear(&self) {
        let mut nodes = self.nodes.write().await;
        let mut ledger = self.ledger.write().await;
        let mut log = self.log.write().await;
        let mut metrics = self.metrics.write().await;
        let mut fallback = self.fallback.write().await;

        *nodes = self.config.roster.iter().cloned().map(SimNode::new).collect();
        ledger.clear();
        *log = SyncLog::default();
        *metrics = SyncMetrics::default();
        fallback.clear();

        persist(self.store.as_ref(), keys::SYNC_LEDGER, &*ledger);
        persist(self.store.as_ref(), keys::SYNC_LOG, &*log);
        persist(self.store.as_ref(), keys::SYNC_METRICS, &*metrics);
        persist(self.store.as_ref(), keys::SYNC_FALLBACK, &*fallback);
        info!("🧹 Sync coordinator cleared");
    }
}

fn node_signature(node_id: &NodeId, entry_id: &str, proof_digest: &str) -> String {
    let hash = digest(format!("{}:{}:{}", node_id, entry_id, proof_digest).as_bytes());
    format!("0x{}", &hash[..32])
}

/// CID over the stable part of an entry, so repeated syncs of the same
/// credential along the same route agree.
fn entry_cid(entry: &SyncEntry) -> Result<String> {
    derive_cid(&json!({
        "proof_digest": entry.proof_digest,
        "source_id": entry.source_id,
        "target_id": entry.target_id,
        "kind": entry.kind,
        "zkp_verified": entry.zkp_verified,
    }))
}

fn sync_log_record(entry: &SyncEntry) -> SyncLogRecord {
    SyncLogRecord {
        seq: 0,
        record_id: entry.id.clone(),
        kind: LogRecordKind::Sync,
        credential_ref: entry.proof_digest.clone(),
        proof_digest: entry.proof_digest.clone(),
        status: entry.status.as_str().to_string(),
        cid: entry.cid.clone(),
        verified: entry.zkp_verified,
        consensus_nodes: entry.consensus_nodes,
        supersedes: Vec::new(),
        timestamp: entry.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_common::random::FixedRandom;
    use credo_common::storage::MemoryStore;
    use credo_mint::MintConfig;
    use serde_json::json;

    async fn setup(rng: Arc<dyn RandomSource>, config: SyncConfig) -> (Arc<MintAuthority>, ConsensusSyncCoordinator) {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let mint = Arc::new(MintAuthority::new(
            MintConfig::deterministic(),
            Arc::clone(&store),
            Arc::new(FixedRandom(0.0)),
        ));
        let coordinator = ConsensusSyncCoordinator::new(config, Arc::clone(&mint), store, rng);
        (mint, coordinator)
    }

    async fn minted(mint: &MintAuthority) -> String {
        mint.mint("did:credo:alice", "identity", json!({}), None)
            .await
            .unwrap()
            .proof_digest()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_quorum_threshold() {
        assert_eq!(quorum_threshold(3, 5), 3);
        assert_eq!(quorum_threshold(3, 4), 2);
        assert_eq!(quorum_threshold(3, 1), 1);
        assert_eq!(quorum_threshold(3, 0), 0);
        assert_eq!(quorum_threshold(3, 10), 3);
    }

    #[tokio::test]
    async fn test_sync_reaches_consensus_with_full_roster() {
        let (mint, coordinator) = setup(Arc::new(FixedRandom(0.0)), SyncConfig::deterministic()).await;
        let digest = minted(&mint).await;

        let result = coordinator.sync(&digest, "did:credo:alice", "did:credo:registry", SyncKind::Upload).await;
        assert!(result.success);
        assert!(result.consensus_reached);
        assert_eq!(result.nodes_participated, 5);
        assert_eq!(result.status, SyncStatus::Completed);
        assert!(result.cid.as_deref().unwrap().starts_with("Qm"));

        let entry = result.entry.unwrap();
        assert!(entry.zkp_verified);
        assert_eq!(entry.node_signatures.len(), 5);
        assert!(entry.node_signatures.iter().all(|s| s.signature.starts_with("0x") && s.signature.len() == 34));

        assert_eq!(coordinator.ledger().await.len(), 1);
        assert_eq!(coordinator.log().await.len(), 1);
        assert_eq!(coordinator.latest_entry_for(&digest).await.unwrap().id, entry.id);
    }

    #[tokio::test]
    async fn test_missing_credential_is_a_failed_result() {
        let (_mint, coordinator) = setup(Arc::new(FixedRandom(0.0)), SyncConfig::deterministic()).await;

        let result = coordinator.sync("feedface", "a", "b", SyncKind::Download).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("CredentialNotFound"));
        assert!(result.entry.is_none());

        let metrics = coordinator.metrics().await;
        assert_eq!(metrics.failed_syncs, 1);
        assert!(coordinator.ledger().await.is_empty());
        assert_eq!(coordinator.log().await[0].status, "failed");
    }

    #[tokio::test]
    async fn test_no_online_nodes_means_no_consensus() {
        let (mint, coordinator) = setup(Arc::new(FixedRandom(0.0)), SyncConfig::deterministic()).await;
        let digest = minted(&mint).await;
        for node in coordinator.nodes().await {
            coordinator.set_node_online(node.id(), false).await.unwrap();
        }

        let result = coordinator.sync(&digest, "a", "b", SyncKind::Consensus).await;
        assert!(!result.consensus_reached);
        assert_eq!(result.nodes_participated, 0);
        assert_eq!(result.error.as_deref(), Some("ConsensusFailure"));
        assert_eq!(coordinator.metrics().await.offline_nodes, 5);
    }

    #[tokio::test]
    async fn test_rejecting_nodes_fail_and_degrade() {
        // 0.95 is above every acceptance probability and below full uptime.
        let (mint, coordinator) = setup(Arc::new(FixedRandom(0.95)), SyncConfig::deterministic()).await;
        let digest = minted(&mint).await;

        let first = coordinator.sync(&digest, "a", "b", SyncKind::Upload).await;
        assert!(!first.success);
        assert!(!first.path_b_triggered);
        assert!(coordinator.is_degraded().await);
        assert_eq!(coordinator.fallback_snapshots().await.len(), 1);

        let second = coordinator.sync(&digest, "a", "b", SyncKind::Upload).await;
        assert!(second.path_b_triggered);
        let snapshots = coordinator.fallback_snapshots().await;
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[1].path_b_triggered);
        assert_eq!(snapshots[1].offline_nodes, 1, "witness-2 misses its uptime roll");
    }

    #[tokio::test]
    async fn test_unknown_node_is_not_found() {
        let (_mint, coordinator) = setup(Arc::new(FixedRandom(0.0)), SyncConfig::deterministic()).await;
        let err = coordinator.set_node_load(&NodeId::new("ghost"), 10).await.unwrap_err();
        assert!(matches!(err, CredoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let (mint, coordinator) = setup(Arc::new(FixedRandom(0.95)), SyncConfig::deterministic()).await;
        let digest = minted(&mint).await;
        coordinator.sync(&digest, "a", "b", SyncKind::Upload).await;
        coordinator.set_node_online(&NodeId::new("archive-1"), false).await.unwrap();
        assert!(coordinator.is_degraded().await);

        coordinator.clear().await;
        assert!(!coordinator.is_degraded().await);
        assert!(coordinator.ledger().await.is_empty());
        assert!(coordinator.log().await.is_empty());
        assert!(coordinator.nodes().await.iter().all(|n| n.enabled));
    }
}
