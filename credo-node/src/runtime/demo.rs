use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use credo_common::error::{CredoError, Result};
use credo_consensus::SyncKind;
use credo_export::{EntryOrigin, ExportEntry, ExportFilters, Role};
use credo_reconcile::{ConflictKind, ResolutionStatus};

use super::builder::{Engine, EngineSnapshot};

const REGISTRY: &str = "did:credo:registry";
const GOVERNOR: &str = "did:credo:governor";

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub minted: Vec<String>,
    /// Structurally valid requests rejected by a simulated fault.
    pub mint_faults: usize,
    pub validation_errors: Vec<String>,
    pub syncs_committed: usize,
    pub syncs_failed: usize,
    pub citizen_export_entries: usize,
    pub override_rejected: bool,
    pub global_export_entries: usize,
    pub global_export_mock: bool,
    pub global_signature_valid: bool,
    pub conflicts: Vec<DemoConflict>,
    pub snapshot: EngineSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoConflict {
    pub credential_ref: String,
    pub kind: ConflictKind,
    pub status: ResolutionStatus,
    pub sources: usize,
}

/// Mints a batch with two malformed requests, syncs what was issued, exports
/// it as a citizen and as a governor, then tampers with one vault copy and
/// reconciles.
pub async fn run_demo(engine: &Engine) -> Result<DemoReport> {
    info!("🎬 Demo run starting");

    let mut minted = Vec::new();
    let mut mint_faults = 0;
    let mut validation_errors = Vec::new();

    let requests = (0..8)
        .map(|i| (format!("did:credo:demo-{i}"), class_for(i), json!({ "seq": i, "tier": i % 3 })))
        .chain([
            ("not-a-did".to_string(), "identity", json!({})),
            ("did:credo:demo-null".to_string(), "identity", Value::Null),
        ]);
    for (subject, class, metadata) in requests {
        match engine.mint.mint(&subject, class, metadata, None).await {
            Ok(result) => match result.proof_digest() {
                Some(digest) if result.success => minted.push(digest.to_string()),
                _ => mint_faults += 1,
            },
            Err(CredoError::Validation(e)) => validation_errors.push(e.kind().to_string()),
            Err(e) => return Err(e),
        }
    }

    let mut syncs_committed = 0;
    let mut syncs_failed = 0;
    for (i, digest) in minted.iter().enumerate() {
        let Some(credential) = engine.mint.find_credential(digest).await else {
            continue;
        };
        let kind = if i % 2 == 0 { SyncKind::Upload } else { SyncKind::Verify };
        if engine.sync.sync(digest, &credential.subject_id, REGISTRY, kind).await.success {
            syncs_committed += 1;
        } else {
            syncs_failed += 1;
        }
    }

    let citizen = engine
        .export
        .export("did:credo:demo-0", Role::Citizen, &ExportFilters::default(), false)
        .await?;

    let override_rejected = matches!(
        engine.export.export(GOVERNOR, Role::Governor, &ExportFilters::default(), false).await,
        Err(CredoError::OverrideRequired(_))
    );
    let global = engine
        .export
        .export(GOVERNOR, Role::Governor, &ExportFilters::default(), true)
        .await?;
    let global_signature_valid = engine.export.verify_bundle_signature(&global.bundle.manifest);

    let mut tampered = None;
    for digest in &minted {
        if let Some(entry) = tampered_vault_copy(engine, digest).await {
            tampered = Some(entry);
            break;
        }
    }
    match tampered {
        Some(entry) => {
            engine.export.import_vault_entries(vec![entry]).await;
        }
        None => warn!("⚠️ No synced credential to tamper with, skipping vault import"),
    }

    let conflicts = engine
        .reconciler
        .detect_and_resolve()
        .await
        .into_iter()
        .map(|c| DemoConflict {
            credential_ref: c.credential_ref,
            kind: c.kind,
            status: c.status,
            sources: c.detected_sources.len(),
        })
        .collect();

    let report = DemoReport {
        minted,
        mint_faults,
        validation_errors,
        syncs_committed,
        syncs_failed,
        citizen_export_entries: citizen.bundle.entries.len(),
        override_rejected,
        global_export_entries: global.bundle.entries.len(),
        global_export_mock: global.bundle.manifest.mock,
        global_signature_valid,
        conflicts,
        snapshot: engine.snapshot().await,
    };
    info!(
        "🏁 Demo run finished: {} minted, {} synced, {} conflicts settled",
        report.minted.len(),
        report.syncs_committed,
        report.conflicts.len()
    );
    Ok(report)
}

fn class_for(i: usize) -> &'static str {
    match i % 4 {
        0 => "identity",
        1 => "role",
        2 => "record",
        _ => "governance",
    }
}

/// A vault copy of a synced credential with a corrupted digest.
async fn tampered_vault_copy(engine: &Engine, digest: &str) -> Option<ExportEntry> {
    let latest = engine.sync.latest_entry_for(digest).await?;
    let mut credential = engine.mint.find_credential(digest).await?;
    credential.proof_digest = "0".repeat(64);
    Some(ExportEntry {
        id: format!("vault-{}", &digest[..digest.len().min(12)]),
        credential_ref: digest.to_string(),
        credential,
        sync_status: latest.status.as_str().to_string(),
        cid: latest.cid,
        zkp_validated: true,
        exported_at: latest.updated_at,
        origin: EntryOrigin::Vault,
    })
}
