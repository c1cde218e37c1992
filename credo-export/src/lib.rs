//! Role-scoped export of credential records.
//!
//! The [`ExportGateway`] filters the issued credentials for a requester,
//! drops records that fail the simulated proof check, and packages the rest
//! in a signed bundle. When too many records fail the simulated node sync it
//! hands back a clearly marked mock bundle instead.

pub mod config;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod scope;

pub use config::ExportConfig;
pub use gateway::ExportGateway;
pub use metrics::ExportMetrics;
pub use model::{BundleManifest, EntryOrigin, ExportBundle, ExportEntry, ExportFilters, ExportResult};
pub use scope::{ExportScope, Role};
