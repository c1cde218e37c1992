//! Source indexing and divergence classification.

use std::collections::{BTreeMap, HashSet};

use credo_consensus::{LogRecordKind, SyncLogRecord};
use credo_export::{EntryOrigin, ExportEntry};

use crate::model::{ConflictKind, SourceRecord, SourceStore};

/// Current view of every credential, keyed by the digest it was minted with.
///
/// Each store contributes at most one record per credential: its most recent
/// one that no resolution has superseded.
pub fn build_index(log: &[SyncLogRecord], history: &[ExportEntry]) -> BTreeMap<String, Vec<SourceRecord>> {
    let superseded: HashSet<&str> = log
        .iter()
        .filter(|r| r.kind == LogRecordKind::Resolution)
        .flat_map(|r| r.supersedes.iter().map(String::as_str))
        .collect();

    let mut latest: BTreeMap<(String, SourceStore), SourceRecord> = BTreeMap::new();

    for record in log.iter().filter(|r| !superseded.contains(r.record_id.as_str())) {
        latest.insert(
            (record.credential_ref.clone(), SourceStore::SyncLog),
            SourceRecord {
                record_id: record.record_id.clone(),
                store: SourceStore::SyncLog,
                credential_ref: record.credential_ref.clone(),
                proof_digest: record.proof_digest.clone(),
                status: record.status.clone(),
                cid: record.cid.clone(),
                verified: record.verified,
                timestamp: record.timestamp,
            },
        );
    }

    for entry in history.iter().filter(|e| !superseded.contains(e.id.as_str())) {
        let store = match entry.origin {
            EntryOrigin::Export => SourceStore::ExportHistory,
            EntryOrigin::Vault => SourceStore::Vault,
        };
        latest.insert(
            (entry.credential_ref.clone(), store),
            SourceRecord {
                record_id: entry.id.clone(),
                store,
                credential_ref: entry.credential_ref.clone(),
                proof_digest: entry.credential.proof_digest.clone(),
                status: entry.sync_status.clone(),
                cid: entry.cid.clone(),
                verified: entry.zkp_validated,
                timestamp: entry.exported_at,
            },
        );
    }

    let mut index: BTreeMap<String, Vec<SourceRecord>> = BTreeMap::new();
    for ((credential_ref, _), record) in latest {
        index.entry(credential_ref).or_default().push(record);
    }
    index
}

/// Classifies divergence between sources of one credential, first match wins:
/// digests, then statuses, then CIDs, then verification.
pub fn classify(sources: &[SourceRecord]) -> Option<ConflictKind> {
    if sources.len() < 2 {
        return None;
    }

    if !all_equal(sources.iter().map(|s| &s.proof_digest)) {
        Some(ConflictKind::HashMismatch)
    } else if !all_equal(sources.iter().map(|s| &s.status)) {
        Some(ConflictKind::StateDivergence)
    } else if !all_equal(sources.iter().map(|s| &s.cid)) {
        Some(ConflictKind::CidInconsistency)
    } else if sources.iter().any(|s| !s.verified) {
        Some(ConflictKind::NodeDisagreement)
    } else {
        None
    }
}

fn all_equal<T: PartialEq>(mut values: impl Iterator<Item = T>) -> bool {
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, digest: &str, status: &str, cid: Option<&str>, verified: bool) -> SourceRecord {
        SourceRecord {
            record_id: id.to_string(),
            store: SourceStore::SyncLog,
            credential_ref: "ref".to_string(),
            proof_digest: digest.to_string(),
            status: status.to_string(),
            cid: cid.map(str::to_string),
            verified,
            timestamp: 0,
        }
    }

    #[test]
    fn test_classification_priority() {
        let a = source("a", "d1", "completed", Some("Qm1"), true);

        assert_eq!(classify(&[a.clone()]), None);
        assert_eq!(classify(&[a.clone(), a.clone()]), None);

        let b = source("b", "d2", "failed", Some("Qm2"), false);
        assert_eq!(classify(&[a.clone(), b]), Some(ConflictKind::HashMismatch));

        let b = source("b", "d1", "failed", Some("Qm2"), false);
        assert_eq!(classify(&[a.clone(), b]), Some(ConflictKind::StateDivergence));

        let b = source("b", "d1", "completed", None, false);
        assert_eq!(classify(&[a.clone(), b]), Some(ConflictKind::CidInconsistency));

        let b = source("b", "d1", "completed", Some("Qm1"), false);
        assert_eq!(classify(&[a, b]), Some(ConflictKind::NodeDisagreement));
    }

    fn log_record(id: &str, credential_ref: &str, kind: LogRecordKind, supersedes: Vec<String>) -> SyncLogRecord {
        SyncLogRecord {
            seq: 0,
            record_id: id.to_string(),
            kind,
            credential_ref: credential_ref.to_string(),
            proof_digest: credential_ref.to_string(),
            status: "completed".to_string(),
            cid: None,
            verified: true,
            consensus_nodes: 3,
            supersedes,
            timestamp: 0,
        }
    }

    #[test]
    fn test_index_keeps_latest_and_skips_superseded() {
        let log = vec![
            log_record("s1", "d1", LogRecordKind::Sync, vec![]),
            log_record("s2", "d1", LogRecordKind::Sync, vec![]),
            log_record("s3", "d2", LogRecordKind::Sync, vec![]),
            log_record("r1", "d2", LogRecordKind::Resolution, vec!["s3".to_string()]),
        ];

        let index = build_index(&log, &[]);
        assert_eq!(index["d1"].len(), 1);
        assert_eq!(index["d1"][0].record_id, "s2");
        assert_eq!(index["d2"][0].record_id, "r1");
    }
}
