//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Maintenance: purges stale unauthorized domains and usage records, and prunes the caches

mod maintenance;

pub use maintenance::{run_maintenance, spawn_maintenance_task, PruneTarget, Retention};
