//! Registry Module
//!
//! Records the pipeline consults or updates outside the artifact cache: the
//! domain allow/deny registry and the per-namespace usage log.

mod domains;
mod usage;

use thiserror::Error;

pub use domains::{Domain, DomainRegistry, InMemoryDomainRegistry};
pub use usage::{InMemoryUsageLog, UsageLog, UsageRecord};

// == Registry Error ==
/// Failure of a registry backend to read or write a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error("registry query failed: {0}")]
    Query(String),
}
