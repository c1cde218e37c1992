use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use credo_common::{
    auth::{ed25519::verify_with_key, BundleSigner},
    crypto::{derive_cid, digest},
    error::{CredoError, Result},
    random::RandomSource,
    storage::{keys, load_collection, persist, KvStore},
    types::validate_subject_id,
    utils::{current_time_millis, simulate_latency},
};
use credo_consensus::ConsensusSyncCoordinator;
use credo_mint::{Credential, MintAuthority};

use crate::{
    config::ExportConfig,
    metrics::ExportMetrics,
    model::{BundleManifest, EntryOrigin, ExportBundle, ExportEntry, ExportFilters, ExportResult},
    scope::{resolve_scope, Role, ScopeGrant},
};

const MOCK_PREFIX: &str = "mock-";

/// Builds role-filtered, signed bundles of credential records.
pub struct ExportGateway {
    config: ExportConfig,
    mint: Arc<MintAuthority>,
    sync: Arc<ConsensusSyncCoordinator>,
    signer: BundleSigner,
    store: Arc<dyn KvStore>,
    rng: Arc<dyn RandomSource>,
    history: RwLock<VecDeque<ExportEntry>>,
    fallback: RwLock<Vec<BundleManifest>>,
    metrics: RwLock<ExportMetrics>,
}

impl ExportGateway {
    pub fn new(
        config: ExportConfig,
        mint: Arc<MintAuthority>,
        sync: Arc<ConsensusSyncCoordinator>,
        signer: BundleSigner,
        store: Arc<dyn KvStore>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let history: VecDeque<ExportEntry> = load_collection(store.as_ref(), keys::EXPORT_HISTORY);
        let fallback: Vec<BundleManifest> = load_collection(store.as_ref(), keys::EXPORT_FALLBACK);
        let metrics: ExportMetrics = load_collection(store.as_ref(), keys::EXPORT_METRICS);

        if !history.is_empty() {
            info!("📂 Restored {} export history entries", history.len());
        }

        Self {
            config,
            mint,
            sync,
            signer,
            store,
            rng,
            history: RwLock::new(history),
            fallback: RwLock::new(fallback),
            metrics: RwLock::new(metrics),
        }
    }

    /// Exports the credentials visible to `requester_id` under `role`.
    ///
    /// # Errors
    /// Validation, [`CredoError::ScopeViolation`], [`CredoError::OverrideRequired`]
    /// and [`CredoError::CapacityExceeded`] are returned to the caller. Node
    /// sync trouble yields a mock bundle with `path_b_triggered` set instead.
    pub async fn export(
        &self,
        requester_id: &str,
        role: Role,
        filters: &ExportFilters,
        override_flag: bool,
    ) -> Result<ExportResult> {
        let started = Instant::now();
        match self.build(requester_id, role, filters, override_flag, started).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("❌ Export for '{}' as {} rejected: {}", requester_id, role, e);
                let mut metrics = self.metrics.write().await;
                metrics.record_failure(current_time_millis());
                persist(self.store.as_ref(), keys::EXPORT_METRICS, &*metrics);
                Err(e)
            }
        }
    }

    async fn build(
        &self,
        requester_id: &str,
        role: Role,
        filters: &ExportFilters,
        override_flag: bool,
        started: Instant,
    ) -> Result<ExportResult> {
        validate_subject_id(requester_id)?;
        filters.validate()?;
        let grant = resolve_scope(requester_id, role, filters.target_id.as_deref(), override_flag)?;

        simulate_latency(self.rng.as_ref(), self.config.latency_ms).await;

        let candidates: Vec<Credential> = self
            .mint
            .credentials()
            .await
            .into_iter()
            .filter(|c| in_scope(&grant, c))
            .filter(|c| filters.matches(c))
            .collect();

        let mut verified = Vec::with_capacity(candidates.len());
        let mut dropped_unverified = 0;
        for credential in candidates {
            if self.rng.chance(self.config.verification_pass_rate) {
                verified.push(credential);
            } else {
                dropped_unverified += 1;
                warn!("🔍 Dropped {} from export: proof verification failed", short(&credential.proof_digest));
            }
        }

        let node_sync_failures = verified
            .iter()
            .filter(|_| !self.rng.chance(self.config.node_sync_success_rate))
            .count();
        let failure_fraction = if verified.is_empty() {
            0.0
        } else {
            node_sync_failures as f64 / verified.len() as f64
        };
        let mock = failure_fraction > self.config.node_sync_failure_threshold;

        let now = current_time_millis();
        let mut entries = Vec::with_capacity(verified.len());
        for credential in verified {
            let latest = self.sync.latest_entry_for(&credential.proof_digest).await;
            entries.push(ExportEntry {
                id: Uuid::new_v4().to_string(),
                credential_ref: credential.proof_digest.clone(),
                sync_status: latest
                    .as_ref()
                    .map(|e| e.status.as_str().to_string())
                    .unwrap_or_else(|| "unsynced".to_string()),
                cid: latest.and_then(|e| e.cid),
                zkp_validated: !mock,
                exported_at: now,
                origin: EntryOrigin::Export,
                credential,
            });
        }

        let total_size = serde_json::to_vec(&entries)?.len();
        if total_size > self.config.max_bundle_bytes {
            return Err(CredoError::CapacityExceeded { size: total_size, limit: self.config.max_bundle_bytes });
        }

        let cid = derive_cid(&entries)?;
        let (cid, signature) = if mock {
            let mock_cid = format!("{}{}", MOCK_PREFIX, cid);
            let mock_sig = format!("{}{}", MOCK_PREFIX, &digest(mock_cid.as_bytes())[..32]);
            (mock_cid, mock_sig)
        } else {
            let signature = self.signer.sign(cid.as_bytes());
            (cid, signature)
        };

        let manifest = BundleManifest {
            id: Uuid::new_v4().to_string(),
            creator: requester_id.to_string(),
            role,
            scope: grant.scope,
            entry_count: entries.len(),
            total_size,
            cid,
            signature,
            created_at: now,
            mock,
        };

        if mock {
            warn!(
                "🛟 {}/{} records failed node sync: issuing mock bundle {}",
                node_sync_failures,
                entries.len(),
                manifest.id
            );
            let mut fallback = self.fallback.write().await;
            fallback.push(manifest.clone());
            persist(self.store.as_ref(), keys::EXPORT_FALLBACK, &*fallback);
        }

        self.push_history(entries.iter().cloned()).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        {
            let mut metrics = self.metrics.write().await;
            metrics.dropped_unverified += dropped_unverified as u64;
            metrics.record_success(duration_ms, total_size, entries.len(), mock, current_time_millis());
            persist(self.store.as_ref(), keys::EXPORT_METRICS, &*metrics);
        }

        info!(
            "📦 Exported {} records for '{}' ({} scope, {} bytes)",
            manifest.entry_count, requester_id, manifest.scope, manifest.total_size
        );
        tracing::info!(
            target: "ledger",
            "EVENT:EXPORT bundle={} creator={} role={} scope={} entries={} cid={} mock={}",
            manifest.id, requester_id, role, manifest.scope, manifest.entry_count, manifest.cid, mock
        );

        Ok(ExportResult {
            bundle: ExportBundle { manifest, entries },
            path_b_triggered: mock,
            dropped_unverified,
            node_sync_failures,
            duration_ms,
        })
    }

    /// Adds records kept by an external vault to the history the reconciler
    /// cross-checks against the sync log.
    pub async fn import_vault_entries(&self, entries: Vec<ExportEntry>) -> usize {
        let count = entries.len();
        self.push_history(entries.into_iter().map(|mut e| {
            e.origin = EntryOrigin::Vault;
            e
        }))
        .await;
        debug!("Imported {} vault entries", count);
        count
    }

    /// Checks a manifest's signature against this gateway's key. Mock
    /// bundles never verify.
    pub fn verify_bundle_signature(&self, manifest: &BundleManifest) -> bool {
        if manifest.mock {
            return false;
        }
        verify_with_key(manifest.cid.as_bytes(), &manifest.signature, &self.signer.public_key())
    }

    pub fn public_key_hex(&self) -> String {
        self.signer.public_key_hex()
    }

    pub async fn history(&self) -> Vec<ExportEntry> {
        self.history.read().await.iter().cloned().collect()
    }

    pub async fn mock_manifests(&self) -> Vec<BundleManifest> {
        self.fallback.read().await.clone()
    }

    pub async fn metrics(&self) -> ExportMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn clear(&self) {
        let mut history = self.history.write().await;
        let mut fallback = self.fallback.write().await;
        let mut metrics = self.metrics.write().await;
        history.clear();
        fallback.clear();
        *metrics = ExportMetrics::default();
        persist(self.store.as_ref(), keys::EXPORT_HISTORY, &*history);
        persist(self.store.as_ref(), keys::EXPORT_FALLBACK, &*fallback);
        persist(self.store.as_ref(), keys::EXPORT_METRICS, &*metrics);
        info!("🧹 Export gateway cleared");
    }

    async fn push_history(&self, entries: impl Iterator<Item = ExportEntry>) {
        let mut history = self.history.write().await;
        history.extend(entries);
        while history.len() > self.config.history_capacity {
            history.pop_front();
        }
        persist(self.store.as_ref(), keys::EXPORT_HISTORY, &*history);
    }
}

fn in_scope(grant: &ScopeGrant, credential: &Credential) -> bool {
    grant.subject.as_deref().map_or(true, |s| credential.subject_id == s)
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_common::random::FixedRandom;
    use credo_common::storage::MemoryStore;
    use credo_common::CredentialClass;
    use credo_consensus::{SyncConfig, SyncKind};
    use credo_mint::MintConfig;
    use serde_json::json;

    struct Fixture {
        mint: Arc<MintAuthority>,
        sync: Arc<ConsensusSyncCoordinator>,
        gateway: ExportGateway,
    }

    fn fixture(config: ExportConfig, export_rng: f64) -> Fixture {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let happy: Arc<dyn RandomSource> = Arc::new(FixedRandom(0.0));
        let mint = Arc::new(MintAuthority::new(MintConfig::deterministic(), Arc::clone(&store), Arc::clone(&happy)));
        let sync = Arc::new(ConsensusSyncCoordinator::new(
            SyncConfig::deterministic(),
            Arc::clone(&mint),
            Arc::clone(&store),
            happy,
        ));
        let gateway = ExportGateway::new(
            config,
            Arc::clone(&mint),
            Arc::clone(&sync),
            BundleSigner::from_seed(42),
            store,
            Arc::new(FixedRandom(export_rng)),
        );
        Fixture { mint, sync, gateway }
    }

    async fn mint(f: &Fixture, subject: &str, class: &str) -> String {
        f.mint
            .mint(subject, class, json!({"n": 1}), None)
            .await
            .unwrap()
            .proof_digest()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_citizen_export_is_signed_and_scoped() {
        let f = fixture(ExportConfig::deterministic(), 0.0);
        let digest = mint(&f, "did:credo:alice", "identity").await;
        mint(&f, "did:credo:bob", "identity").await;
        f.sync.sync(&digest, "did:credo:alice", "did:credo:registry", SyncKind::Upload).await;

        let result = f
            .gateway
            .export("did:credo:alice", Role::Citizen, &ExportFilters::default(), false)
            .await
            .unwrap();

        assert!(!result.path_b_triggered);
        let bundle = result.bundle;
        assert_eq!(bundle.entries.len(), 1);
        assert_eq!(bundle.entries[0].credential.subject_id, "did:credo:alice");
        assert_eq!(bundle.entries[0].sync_status, "completed");
        assert!(bundle.entries[0].cid.is_some());
        assert!(bundle.entries[0].zkp_validated);
        assert_eq!(bundle.manifest.entry_count, 1);
        assert!(bundle.manifest.cid.starts_with("Qm"));
        assert!(f.gateway.verify_bundle_signature(&bundle.manifest));

        let mut tampered = bundle.manifest.clone();
        tampered.cid.push('x');
        assert!(!f.gateway.verify_bundle_signature(&tampered));
    }

    #[tokio::test]
    async fn test_citizen_targeting_someone_else_is_a_scope_violation() {
        let f = fixture(ExportConfig::deterministic(), 0.0);
        let err = f
            .gateway
            .export("did:credo:alice", Role::Citizen, &ExportFilters::for_target("did:credo:bob"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CredoError::ScopeViolation { .. }));
        assert_eq!(f.gateway.metrics().await.failed_exports, 1);
    }

    #[tokio::test]
    async fn test_filters_and_unsynced_status() {
        let f = fixture(ExportConfig::deterministic(), 0.0);
        let revoked = mint(&f, "did:credo:carol", "role").await;
        mint(&f, "did:credo:carol", "record").await;
        mint(&f, "did:credo:carol", "role").await;
        f.mint.revoke(&revoked, None).await.unwrap();

        let filters = ExportFilters {
            classes: vec![CredentialClass::Role],
            exclude_revoked: true,
            ..ExportFilters::for_target("did:credo:carol")
        };
        let result = f.gateway.export("did:credo:mod", Role::Moderator, &filters, false).await.unwrap();
        assert_eq!(result.bundle.entries.len(), 1);
        assert_eq!(result.bundle.entries[0].sync_status, "unsynced");
        assert_eq!(result.bundle.manifest.scope, crate::ExportScope::Jurisdiction);
    }

    #[tokio::test]
    async fn test_verification_gate_drops_records() {
        // 0.92 fails the 0.9 proof check for every record.
        let f = fixture(ExportConfig::deterministic(), 0.92);
        mint(&f, "did:credo:dave", "vault").await;
        mint(&f, "did:credo:dave", "vault").await;

        let result = f.gateway.export("did:credo:dave", Role::Citizen, &ExportFilters::default(), false).await.unwrap();
        assert_eq!(result.dropped_unverified, 2);
        assert!(result.bundle.entries.is_empty());
        assert!(!result.path_b_triggered);
        assert_eq!(f.gateway.metrics().await.dropped_unverified, 2);
    }

    #[tokio::test]
    async fn test_node_sync_failures_produce_mock_bundle() {
        let config = ExportConfig { verification_pass_rate: 1.0, ..ExportConfig::deterministic() };
        let f = fixture(config, 0.97);
        mint(&f, "did:credo:erin", "identity").await;

        let result = f.gateway.export("did:credo:erin", Role::Citizen, &ExportFilters::default(), false).await.unwrap();
        assert!(result.path_b_triggered);
        let manifest = &result.bundle.manifest;
        assert!(manifest.mock);
        assert!(manifest.cid.starts_with("mock-"));
        assert!(manifest.signature.starts_with("mock-"));
        assert!(result.bundle.entries.iter().all(|e| !e.zkp_validated));
        assert!(!f.gateway.verify_bundle_signature(manifest));
        assert_eq!(f.gateway.mock_manifests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_size_cap_is_enforced() {
        let config = ExportConfig { max_bundle_bytes: 64, ..ExportConfig::deterministic() };
        let f = fixture(config, 0.0);
        mint(&f, "did:credo:frank", "record").await;

        let err = f.gateway.export("did:credo:frank", Role::Citizen, &ExportFilters::default(), false).await.unwrap_err();
        assert_eq!(err.kind(), "SizeLimitExceeded");
        assert!(f.gateway.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_vault_import_is_tagged() {
        let f = fixture(ExportConfig::deterministic(), 0.0);
        mint(&f, "did:credo:gina", "identity").await;
        let exported = f.gateway.export("did:credo:gina", Role::Citizen, &ExportFilters::default(), false).await.unwrap();

        let imported = f.gateway.import_vault_entries(exported.bundle.entries).await;
        assert_eq!(imported, 1);
        let history = f.gateway.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].origin, EntryOrigin::Vault);

        f.gateway.clear().await;
        assert!(f.gateway.history().await.is_empty());
    }
}
