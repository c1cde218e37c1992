//! Cross-store conflict detection and resolution.
//!
//! The sync log and the export/vault history are maintained independently
//! and may disagree about the same credential. The [`ConflictReconciler`]
//! indexes both, classifies the divergence, revalidates the proof, asks a
//! simulated node committee to vote, and writes accepted resolutions back
//! into the sync log.

pub mod config;
pub mod detect;
pub mod metrics;
pub mod model;
pub mod reconciler;
pub mod voting;

pub use config::ReconcileConfig;
pub use metrics::ReconcileMetrics;
pub use model::{ConflictEntry, ConflictKind, NodeVote, ResolutionStatus, Revalidation, SourceRecord, SourceStore, Vote};
pub use reconciler::ConflictReconciler;
