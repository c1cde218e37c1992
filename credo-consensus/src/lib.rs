//! Quorum-based propagation of minted credentials.
//!
//! This module simulates the core logic of a distributed sync protocol:
//! a minted credential is offered to the online nodes of a fixed roster,
//! each node independently accepts or rejects it after a synthetic delay,
//! and a quorum of acceptances commits the sync into the ledger.
//!
//! Node communication is local and latency-aware, standing in for a real
//! transport rather than implementing one.

pub mod config;
pub mod coordinator;
pub mod entry;
pub mod log;
pub mod metrics;
pub mod nodes;

pub use config::SyncConfig;
pub use coordinator::{ConsensusSyncCoordinator, SyncResult};
pub use entry::{NodeResponse, NodeSignature, SyncEntry, SyncKind, SyncStatus};
pub use log::{LogRecordKind, SyncLog, SyncLogRecord};
pub use metrics::{SyncFallbackRecord, SyncMetrics};
pub use nodes::{NodeKind, NodeSpec, SimNode};
