//! Periodic Maintenance Task
//!
//! Purges stale unauthorized domains from the registry, drops usage records
//! past their retention and prunes every cache namespace back under its
//! size cap.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cache::ArtifactStore;
use crate::registry::{DomainRegistry, UsageLog};

/// A namespace the maintenance task prunes. `store` is `None` when the
/// namespace's cache is disabled; `usage` is `None` when it keeps no log.
#[derive(Clone)]
pub struct PruneTarget {
    pub namespace: &'static str,
    pub store: Option<Arc<dyn ArtifactStore>>,
    pub usage: Option<Arc<dyn UsageLog>>,
}

/// How long purgeable records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    /// Unauthorized domains untouched for longer than this are purged
    pub domains: Duration,
    /// Usage records neither created nor accessed for longer than this are purged
    pub usage: Duration,
}

/// Runs one maintenance pass. Failures are logged and never abort the pass.
pub async fn run_maintenance(registry: &dyn DomainRegistry, targets: &[PruneTarget], retention: Retention) {
    match chrono::Duration::from_std(retention.domains) {
        Ok(retention) => match registry.delete_unauthorized_stale(retention).await {
            Ok(purged) => info!(purged, "stale unauthorized domains purged"),
            Err(e) => error!(error = %e, "failed to purge unauthorized domains"),
        },
        Err(e) => error!(error = %e, "domain retention out of range, skipping purge"),
    }

    let usage_retention = chrono::Duration::from_std(retention.usage);
    for target in targets {
        let Some(usage) = &target.usage else { continue };
        match &usage_retention {
            Ok(retention) => match usage.delete_stale(*retention).await {
                Ok(purged) => info!(namespace = target.namespace, purged, "stale usage records purged"),
                Err(e) => error!(namespace = target.namespace, error = %e, "failed to purge usage records"),
            },
            Err(e) => error!(error = %e, "usage retention out of range, skipping purge"),
        }
    }

    for target in targets {
        let Some(store) = target.store.clone() else { continue };
        match tokio::task::spawn_blocking(move || store.prune()).await {
            Ok(Ok(outcome)) => info!(
                namespace = target.namespace,
                total_bytes = outcome.total_bytes,
                removed_files = outcome.removed_files,
                removed_bytes = outcome.removed_bytes,
                "cache maintenance finished"
            ),
            Ok(Err(e)) => error!(namespace = target.namespace, error = %e, "cache prune failed"),
            Err(e) => error!(namespace = target.namespace, error = %e, "cache prune task failed"),
        }
    }
}

/// Spawns the maintenance loop: one pass immediately, then one per
/// `interval`.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_maintenance_task(
    registry: Arc<dyn DomainRegistry>,
    targets: Vec<PruneTarget>,
    interval: Duration,
    retention: Retention,
) -> JoinHandle<()> {
    let period = interval.max(Duration::from_secs(1));

    tokio::spawn(async move {
        info!("Starting maintenance task with interval of {:?}", period);

        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            run_maintenance(registry.as_ref(), &targets, retention).await;
        }
    })
}
