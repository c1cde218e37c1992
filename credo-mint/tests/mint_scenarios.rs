use std::sync::Arc;

use credo_common::random::FixedRandom;
use credo_common::storage::RedbStore;
use credo_common::KvStore;
use credo_mint::{MintAuthority, MintConfig};
use serde_json::{json, Value};

#[tokio::test]
async fn test_eight_valid_two_invalid_gives_eighty_percent() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KvStore> = Arc::new(RedbStore::open(dir.path()).unwrap());
    let mint = MintAuthority::new(MintConfig::deterministic(), store, Arc::new(FixedRandom(0.0)));

    let mut successes = 0;
    let mut validation_errors = 0;

    let classes = ["identity", "role", "record", "governance", "vault", "identity", "role", "record"];
    for (i, class) in classes.iter().enumerate() {
        let subject = format!("did:credo:citizen-{i}");
        match mint.mint(&subject, class, json!({"seq": i}), None).await {
            Ok(r) if r.success => successes += 1,
            Ok(_) => panic!("no injected failures configured"),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    for (subject, metadata) in [("not-a-did", json!({})), ("did:credo:frank", Value::Null)] {
        match mint.mint(subject, "identity", metadata, None).await {
            Err(e) if e.is_validation() => validation_errors += 1,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    assert_eq!(successes, 8);
    assert_eq!(validation_errors, 2);

    let metrics = mint.metrics().await;
    assert_eq!(metrics.total_mints, 10);
    assert!((metrics.success_rate - 0.8).abs() < 1e-9);
    assert_eq!(mint.credentials().await.len(), 8);
}

#[tokio::test]
async fn test_remint_at_later_time_changes_digest() {
    let mint = MintAuthority::new(
        MintConfig::deterministic(),
        Arc::new(credo_common::storage::MemoryStore::new()),
        Arc::new(FixedRandom(0.0)),
    );

    let a = mint.mint("did:credo:gina", "identity", json!({"k": "v"}), None).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(3)).await;
    let b = mint.mint("did:credo:gina", "identity", json!({"k": "v"}), None).await.unwrap();

    let (a, b) = (a.credential.unwrap(), b.credential.unwrap());
    assert_ne!(a.issued_at, b.issued_at);
    assert_ne!(a.proof_digest, b.proof_digest);
}

#[tokio::test]
async fn test_concurrent_mints_keep_counters_consistent() {
    let mint = Arc::new(MintAuthority::new(
        MintConfig { latency_ms: (1, 5), ..MintConfig::deterministic() },
        Arc::new(credo_common::storage::MemoryStore::new()),
        Arc::new(credo_common::random::ThreadRandom),
    ));

    let mut handles = Vec::new();
    for i in 0..20 {
        let mint = Arc::clone(&mint);
        handles.push(tokio::spawn(async move {
            mint.mint(&format!("did:credo:p{i}"), "record", json!({}), None).await
        }));
    }
    for h in handles {
        assert!(h.await.unwrap().unwrap().success);
    }

    let metrics = mint.metrics().await;
    assert_eq!(metrics.total_mints, 20);
    assert_eq!(metrics.successful_mints, 20);
    assert_eq!(mint.history().await.len(), 20);
}
