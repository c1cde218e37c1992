//! Append-only audit log of every sync attempt and every reconciliation
//! resolution. Kept separate from the ledger of finalized entries; the
//! reconciler reads it to find divergence.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRecordKind {
    Sync,
    Resolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogRecord {
    /// Assigned on append, strictly increasing.
    pub seq: u64,
    pub record_id: String,
    pub kind: LogRecordKind,
    /// Identity of the credential this record is about.
    pub credential_ref: String,
    /// Digest as observed by the writer of this record.
    pub proof_digest: String,
    pub status: String,
    pub cid: Option<String>,
    pub verified: bool,
    pub consensus_nodes: usize,
    /// Record ids (from any store) made obsolete by this resolution.
    #[serde(default)]
    pub supersedes: Vec<String>,
    pub timestamp: u64,
}

impl SyncLogRecord {
    /// A resolution written back by the reconciler.
    pub fn resolution(
        record_id: String,
        credential_ref: &str,
        proof_digest: &str,
        status: &str,
        cid: Option<String>,
        supersedes: Vec<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            seq: 0,
            record_id,
            kind: LogRecordKind::Resolution,
            credential_ref: credential_ref.to_string(),
            proof_digest: proof_digest.to_string(),
            status: status.to_string(),
            cid,
            verified: true,
            consensus_nodes: 0,
            supersedes,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncLog {
    records: VecDeque<SyncLogRecord>,
    next_seq: u64,
}

impl SyncLog {
    /// Appends `record`, stamping it with the next sequence number. Evicts the
    /// oldest records past `capacity`.
    pub fn append(&mut self, mut record: SyncLogRecord, capacity: usize) -> u64 {
        self.next_seq += 1;
        record.seq = self.next_seq;
        self.records.push_back(record);
        while self.records.len() > capacity {
            self.records.pop_front();
        }
        self.next_seq
    }

    pub fn records(&self) -> impl Iterator<Item = &SyncLogRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_credential<'a>(&'a self, credential_ref: &'a str) -> impl Iterator<Item = &'a SyncLogRecord> + 'a {
        self.records.iter().filter(move |r| r.credential_ref == credential_ref)
    }
}
