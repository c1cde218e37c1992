use serde::{Deserialize, Serialize};

use credo_common::{error::ValidationError, types::validate_subject_id, CredentialClass};
use credo_mint::Credential;

use crate::scope::{ExportScope, Role};

/// Predicates applied after the role scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportFilters {
    pub target_id: Option<String>,
    /// Empty means every class.
    pub classes: Vec<CredentialClass>,
    /// Inclusive lower bound on `issued_at` (ms).
    pub issued_after: Option<u64>,
    /// Inclusive upper bound on `issued_at` (ms).
    pub issued_before: Option<u64>,
    pub exclude_revoked: bool,
}

impl ExportFilters {
    pub fn for_target(target_id: &str) -> Self {
        Self { target_id: Some(target_id.to_string()), ..Self::default() }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(target) = &self.target_id {
            validate_subject_id(target).map_err(|_| ValidationError::InvalidFilter(format!("target_id '{}'", target)))?;
        }
        if let (Some(after), Some(before)) = (self.issued_after, self.issued_before) {
            if after > before {
                return Err(ValidationError::InvalidFilter(format!(
                    "issued_after {} is later than issued_before {}",
                    after, before
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn matches(&self, credential: &Credential) -> bool {
        (self.classes.is_empty() || self.classes.contains(&credential.class))
            && self.issued_after.map_or(true, |t| credential.issued_at >= t)
            && self.issued_before.map_or(true, |t| credential.issued_at <= t)
            && !(self.exclude_revoked && credential.revoked)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    /// Written by this gateway.
    #[default]
    Export,
    /// Supplied by an external vault.
    Vault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub id: String,
    /// Digest the credential was minted with.
    pub credential_ref: String,
    /// Copy of the credential as seen by the writer of this entry.
    pub credential: Credential,
    /// Latest sync status for the credential, `"unsynced"` if never synced.
    pub sync_status: String,
    pub cid: Option<String>,
    pub zkp_validated: bool,
    pub exported_at: u64,
    #[serde(default)]
    pub origin: EntryOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub id: String,
    pub creator: String,
    pub role: Role,
    pub scope: ExportScope,
    pub entry_count: usize,
    /// Serialized size of the entries, in bytes.
    pub total_size: usize,
    pub cid: String,
    /// Signature over `cid`.
    pub signature: String,
    pub created_at: u64,
    pub mock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub manifest: BundleManifest,
    pub entries: Vec<ExportEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub bundle: ExportBundle,
    pub path_b_triggered: bool,
    pub dropped_unverified: usize,
    pub node_sync_failures: usize,
    pub duration_ms: u64,
}
