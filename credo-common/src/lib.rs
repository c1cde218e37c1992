//! Shared building blocks for the credo credential engine.
//!
//! Every component crate depends on this one for hashing, error types,
//! persistence, injectable randomness and the small set of domain types
//! that cross crate boundaries.

pub mod auth;
pub mod crypto;
pub mod error;
pub mod random;
pub mod storage;
pub mod types;
pub mod utils;

pub use error::{CredoError, Result, ValidationError};
pub use random::RandomSource;
pub use storage::KvStore;
pub use types::{CredentialClass, NodeId};
