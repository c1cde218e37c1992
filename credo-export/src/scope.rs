use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use credo_common::error::{CredoError, Result, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Citizen,
    Moderator,
    Governor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Citizen => "citizen",
            Role::Moderator => "moderator",
            Role::Governor => "governor",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "citizen" => Ok(Role::Citizen),
            "moderator" => Ok(Role::Moderator),
            "governor" => Ok(Role::Governor),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    Own,
    Jurisdiction,
    Global,
}

impl fmt::Display for ExportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportScope::Own => "own",
            ExportScope::Jurisdiction => "jurisdiction",
            ExportScope::Global => "global",
        };
        write!(f, "{}", label)
    }
}

/// Scope granted to a request and the subject it is restricted to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeGrant {
    pub scope: ExportScope,
    pub subject: Option<String>,
}

/// Applies the role rules:
///
/// * a citizen only ever sees its own records;
/// * a moderator may target anyone (jurisdiction checks happen elsewhere);
/// * a governor may target anyone, but an untargeted export is global and
///   needs `override_flag`.
pub fn resolve_scope(requester_id: &str, role: Role, target_id: Option<&str>, override_flag: bool) -> Result<ScopeGrant> {
    let own = |subject: &str| subject == requester_id;

    match (role, target_id) {
        (Role::Citizen, Some(target)) if !own(target) => Err(CredoError::ScopeViolation {
            requester: requester_id.to_string(),
            target: target.to_string(),
        }),
        (Role::Citizen, _) => Ok(ScopeGrant { scope: ExportScope::Own, subject: Some(requester_id.to_string()) }),
        (_, Some(target)) if own(target) => Ok(ScopeGrant { scope: ExportScope::Own, subject: Some(target.to_string()) }),
        (_, Some(target)) => Ok(ScopeGrant { scope: ExportScope::Jurisdiction, subject: Some(target.to_string()) }),
        (Role::Moderator, None) => Ok(ScopeGrant { scope: ExportScope::Jurisdiction, subject: None }),
        (Role::Governor, None) if override_flag => Ok(ScopeGrant { scope: ExportScope::Global, subject: None }),
        (Role::Governor, None) => Err(CredoError::OverrideRequired(requester_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: &str = "did:credo:me";

    #[test]
    fn test_citizen_is_pinned_to_itself() {
        let grant = resolve_scope(ME, Role::Citizen, None, false).unwrap();
        assert_eq!(grant, ScopeGrant { scope: ExportScope::Own, subject: Some(ME.to_string()) });

        let err = resolve_scope(ME, Role::Citizen, Some("did:credo:other"), true).unwrap_err();
        assert_eq!(err.kind(), "ScopeViolation");
    }

    #[test]
    fn test_governor_needs_override_for_global() {
        let err = resolve_scope(ME, Role::Governor, None, false).unwrap_err();
        assert!(matches!(err, CredoError::OverrideRequired(_)));

        let grant = resolve_scope(ME, Role::Governor, None, true).unwrap();
        assert_eq!(grant.scope, ExportScope::Global);
        assert_eq!(grant.subject, None);

        let grant = resolve_scope(ME, Role::Governor, Some("did:credo:x"), false).unwrap();
        assert_eq!(grant.scope, ExportScope::Jurisdiction);
    }

    #[test]
    fn test_moderator_is_unrestricted() {
        assert_eq!(resolve_scope(ME, Role::Moderator, None, false).unwrap().scope, ExportScope::Jurisdiction);
        assert_eq!(resolve_scope(ME, Role::Moderator, Some(ME), false).unwrap().scope, ExportScope::Own);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Governor".parse::<Role>().unwrap(), Role::Governor);
        assert!(matches!("admin".parse::<Role>(), Err(ValidationError::InvalidRole(_))));
    }
}
