use std::sync::Arc;

use credo_common::auth::BundleSigner;
use credo_common::random::{FixedRandom, SeededRandom};
use credo_common::storage::RedbStore;
use credo_common::{CredoError, KvStore, RandomSource};
use credo_consensus::{ConsensusSyncCoordinator, SyncConfig, SyncKind};
use credo_export::{ExportConfig, ExportFilters, ExportGateway, ExportScope, Role};
use credo_mint::{MintAuthority, MintConfig};
use serde_json::json;

fn wire(store: Arc<dyn KvStore>, export_rng: Arc<dyn RandomSource>) -> (Arc<MintAuthority>, Arc<ConsensusSyncCoordinator>, ExportGateway) {
    let happy: Arc<dyn RandomSource> = Arc::new(FixedRandom(0.0));
    let mint = Arc::new(MintAuthority::new(MintConfig::deterministic(), Arc::clone(&store), Arc::clone(&happy)));
    let sync = Arc::new(ConsensusSyncCoordinator::new(
        SyncConfig::deterministic(),
        Arc::clone(&mint),
        Arc::clone(&store),
        happy,
    ));
    let gateway = ExportGateway::new(
        ExportConfig::deterministic(),
        Arc::clone(&mint),
        Arc::clone(&sync),
        BundleSigner::from_seed(1),
        store,
        export_rng,
    );
    (mint, sync, gateway)
}

#[tokio::test]
async fn test_governor_global_export_requires_override() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KvStore> = Arc::new(RedbStore::open(dir.path()).unwrap());
    let (mint, sync, gateway) = wire(store, Arc::new(FixedRandom(0.0)));

    for (i, subject) in ["did:credo:a", "did:credo:b", "did:credo:c"].iter().enumerate() {
        let digest = mint
            .mint(subject, "governance", json!({"seat": i}), None)
            .await
            .unwrap()
            .proof_digest()
            .unwrap()
            .to_string();
        sync.sync(&digest, subject, "did:credo:council", SyncKind::Consensus).await;
    }

    let err = gateway
        .export("did:credo:gov", Role::Governor, &ExportFilters::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, CredoError::OverrideRequired(_)));

    let result = gateway
        .export("did:credo:gov", Role::Governor, &ExportFilters::default(), true)
        .await
        .unwrap();
    assert_eq!(result.bundle.manifest.scope, ExportScope::Global);
    assert_eq!(result.bundle.manifest.entry_count, 3);
    assert!(gateway.verify_bundle_signature(&result.bundle.manifest));

    let metrics = gateway.metrics().await;
    assert_eq!(metrics.total_exports, 2);
    assert_eq!(metrics.failed_exports, 1);
}

#[tokio::test]
async fn test_bundle_entries_always_satisfy_filters() {
    let store: Arc<dyn KvStore> = Arc::new(credo_common::storage::MemoryStore::new());
    let (mint, _sync, gateway) = wire(store, Arc::new(SeededRandom::new(99)));

    let classes = ["identity", "role", "record", "governance", "vault"];
    for i in 0..25 {
        let r = mint
            .mint(&format!("did:credo:s{}", i % 3), classes[i % 5], json!({"i": i}), None)
            .await
            .unwrap();
        if i % 4 == 0 {
            mint.revoke(r.proof_digest().unwrap(), Some("rotated")).await.unwrap();
        }
    }

    let filters = ExportFilters {
        classes: vec![credo_common::CredentialClass::Role, credo_common::CredentialClass::Vault],
        exclude_revoked: true,
        ..ExportFilters::default()
    };
    let result = gateway.export("did:credo:mod", Role::Moderator, &filters, false).await.unwrap();

    for entry in &result.bundle.entries {
        assert!(filters.classes.contains(&entry.credential.class));
        assert!(!entry.credential.revoked);
    }
    assert!(result.bundle.manifest.total_size <= credo_export::config::MAX_BUNDLE_BYTES);
    assert_eq!(result.bundle.manifest.entry_count, result.bundle.entries.len());
}
