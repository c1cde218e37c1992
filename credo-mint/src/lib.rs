//! Credential issuance.
//!
//! The [`MintAuthority`] validates and mints credentials bound to a subject
//! identifier, keeps a bounded issuance history, supports revocation and
//! switches to a fallback issuance path once its failure rate crosses the
//! configured threshold.

pub mod authority;
pub mod config;
pub mod metrics;
pub mod model;

pub use authority::MintAuthority;
pub use config::MintConfig;
pub use metrics::MintMetrics;
pub use model::{Credential, FallbackRecord, MintRecord, MintResult};
