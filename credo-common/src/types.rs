use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Unique identifier of a simulated node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

/// The five recognized credential classes.
///
/// Serialized in lowercase (`"identity"`, `"vault"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialClass {
    Identity,
    Role,
    Record,
    Governance,
    Vault,
}

impl CredentialClass {
    pub const ALL: [CredentialClass; 5] = [
        CredentialClass::Identity,
        CredentialClass::Role,
        CredentialClass::Record,
        CredentialClass::Governance,
        CredentialClass::Vault,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialClass::Identity => "identity",
            CredentialClass::Role => "role",
            CredentialClass::Record => "record",
            CredentialClass::Governance => "governance",
            CredentialClass::Vault => "vault",
        }
    }
}

impl fmt::Display for CredentialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CredentialClass {
    type Err = ValidationError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        CredentialClass::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| ValidationError::InvalidClass(s.to_string()))
    }
}

/// Checks a subject identifier against the `did:<method>:<id>` scheme.
///
/// - `method`: 1..=32 lowercase ASCII letters or digits
/// - `id`: 1..=128 chars from `[A-Za-z0-9._:-]`, not ending in `:`
pub fn validate_subject_id(subject_id: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidIdentifier(subject_id.to_string());

    let rest = subject_id.strip_prefix("did:").ok_or_else(invalid)?;
    let (method, id) = rest.split_once(':').ok_or_else(invalid)?;

    let method_ok = !method.is_empty()
        && method.len() <= 32
        && method.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let id_ok = !id.is_empty()
        && id.len() <= 128
        && !id.ends_with(':')
        && id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'));

    if method_ok && id_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_parsing() {
        assert_eq!("Identity".parse::<CredentialClass>().unwrap(), CredentialClass::Identity);
        assert_eq!(" vault ".parse::<CredentialClass>().unwrap(), CredentialClass::Vault);
        assert_eq!(
            "passport".parse::<CredentialClass>(),
            Err(ValidationError::InvalidClass("passport".into()))
        );
    }

    #[test]
    fn test_class_serializes_lowercase() {
        let json = serde_json::to_string(&CredentialClass::Governance).unwrap();
        assert_eq!(json, "\"governance\"");
    }

    #[test]
    fn test_valid_subject_ids() {
        for id in ["did:credo:alice", "did:web:example.com", "did:key:z6Mk-abc_1:2"] {
            assert!(validate_subject_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_invalid_subject_ids() {
        for id in ["", "alice", "did:", "did:credo:", "did:Credo:alice", "did::alice", "did:credo:al ice", "did:credo:alice:"] {
            assert!(validate_subject_id(id).is_err(), "{id:?} should be invalid");
        }
    }
}
