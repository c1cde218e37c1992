use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use credo_common::CredentialClass;

/// A credential bound to a subject identifier.
///
/// The `proof_digest` is fixed at issuance. Revocation only flips `revoked`
/// and records when and why; credentials are never deleted, only evicted
/// from the tail of the bounded issuance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub subject_id: String,
    pub class: CredentialClass,
    pub metadata: Map<String, Value>,
    pub proof_digest: String,
    /// Issuance time in milliseconds since the epoch.
    pub issued_at: u64,
    pub issuer_id: String,
    pub revoked: bool,
    pub revoked_at: Option<u64>,
    pub revocation_reason: Option<String>,
}

impl Credential {
    pub fn is_active(&self) -> bool {
        !self.revoked
    }

    pub(crate) fn revoke(&mut self, at: u64, reason: Option<String>) {
        self.revoked = true;
        self.revoked_at = Some(at);
        self.revocation_reason = reason;
    }
}

/// One mint attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRecord {
    pub id: String,
    pub subject_id: String,
    /// Class exactly as requested, which may not be a recognized class.
    pub requested_class: String,
    pub success: bool,
    pub credential: Option<Credential>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: u64,
}

/// A mint that was satisfied (or rejected) through the degraded-mode path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackRecord {
    pub id: String,
    pub subject_id: String,
    pub credential: Option<Credential>,
    pub reason: String,
    pub failure_rate: f64,
    pub timestamp: u64,
    pub path_b_triggered: bool,
}

/// Outcome of [`crate::MintAuthority::mint`] for structurally valid requests.
///
/// `success && path_b_triggered` means the request was satisfied via the
/// fallback store; `!success` means it was rejected by a simulated fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintResult {
    pub success: bool,
    pub record_id: String,
    pub credential: Option<Credential>,
    pub error: Option<String>,
    pub path_b_triggered: bool,
    pub duration_ms: u64,
}

impl MintResult {
    pub fn proof_digest(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.proof_digest.as_str())
    }
}
