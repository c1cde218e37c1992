use thiserror::Error;

/// Malformed input. Never retried, always surfaced to the caller immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The subject identifier does not follow the `did:<method>:<id>` scheme.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The credential class is not one of the recognized classes.
    #[error("Invalid credential class: {0}")]
    InvalidClass(String),

    /// Metadata is null or not a structured object.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// An export filter is inconsistent (e.g. an empty timestamp range).
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// The requester role is not recognized.
    #[error("Invalid role: {0}")]
    InvalidRole(String),
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidIdentifier(_) => "InvalidIdentifier",
            ValidationError::InvalidClass(_) => "InvalidClass",
            ValidationError::InvalidMetadata(_) => "InvalidMetadata",
            ValidationError::InvalidFilter(_) => "InvalidFilter",
            ValidationError::InvalidRole(_) => "InvalidRole",
        }
    }
}

#[derive(Debug, Error)]
pub enum CredoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No (non-revoked) entry matches the given key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A sync or export referenced a proof digest that was never minted.
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Scope violation: requester '{requester}' may not target '{target}'")]
    ScopeViolation { requester: String, target: String },

    #[error("Override required: global export by '{0}' needs an explicit override")]
    OverrideRequired(String),

    /// Quorum was not reached. Recorded in metrics rather than raised by the engine.
    #[error("Consensus failure: {0}")]
    ConsensusFailure(String),

    #[error("Capacity exceeded: bundle is {size} bytes, limit is {limit} bytes")]
    CapacityExceeded { size: usize, limit: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl CredoError {
    /// Stable short code, used as the `error` string of structured results.
    pub fn kind(&self) -> &'static str {
        match self {
            CredoError::Validation(v) => v.kind(),
            CredoError::NotFound(_) => "NotFound",
            CredoError::CredentialNotFound(_) => "CredentialNotFound",
            CredoError::ScopeViolation { .. } => "ScopeViolation",
            CredoError::OverrideRequired(_) => "OverrideRequired",
            CredoError::ConsensusFailure(_) => "ConsensusFailure",
            CredoError::CapacityExceeded { .. } => "SizeLimitExceeded",
            CredoError::Storage(_) => "Storage",
            CredoError::Serialization(_) => "Serialization",
            CredoError::Io(_) => "Io",
            CredoError::Config(_) => "Config",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CredoError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, CredoError>;
