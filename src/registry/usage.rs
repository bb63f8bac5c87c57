//! Usage Log
//!
//! Tracks when each artifact URL was first generated and how often it has
//! been served from cache.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::RegistryError;

// == Usage Record ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Number of cache hits served for this URL
    pub access_count: u64,
}

// == Usage Log ==
#[async_trait]
pub trait UsageLog: Send + Sync {
    /// Records that an artifact for `url` was generated. Keeps the original
    /// creation time if the URL is already known.
    async fn record_created(&self, url: &str) -> Result<(), RegistryError>;

    /// Records a cache hit. Returns false when `url` has no record yet.
    async fn record_accessed(&self, url: &str) -> Result<bool, RegistryError>;

    async fn get(&self, url: &str) -> Result<Option<UsageRecord>, RegistryError>;

    /// Deletes records not created or accessed within `retention`.
    /// Returns the number of records removed.
    async fn delete_stale(&self, retention: Duration) -> Result<usize, RegistryError>;
}

impl UsageRecord {
    /// Most recent creation or access time.
    pub fn last_used_at(&self) -> DateTime<Utc> {
        self.last_accessed_at.unwrap_or(self.created_at)
    }
}

// == In-Memory Usage Log ==
#[derive(Debug, Default)]
pub struct InMemoryUsageLog {
    records: RwLock<HashMap<String, UsageRecord>>,
}

impl InMemoryUsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl UsageLog for InMemoryUsageLog {
    async fn record_created(&self, url: &str) -> Result<(), RegistryError> {
        let mut records = self.records.write().await;
        records.entry(url.to_string()).or_insert_with(|| UsageRecord {
            url: url.to_string(),
            created_at: Utc::now(),
            last_accessed_at: None,
            access_count: 0,
        });
        Ok(())
    }

    async fn record_accessed(&self, url: &str) -> Result<bool, RegistryError> {
        let mut records = self.records.write().await;
        match records.get_mut(url) {
            Some(record) => {
                record.last_accessed_at = Some(Utc::now());
                record.access_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, url: &str) -> Result<Option<UsageRecord>, RegistryError> {
        Ok(self.records.read().await.get(url).cloned())
    }

    async fn delete_stale(&self, retention: Duration) -> Result<usize, RegistryError> {
        let cutoff = Utc::now() - retention;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.last_used_at() >= cutoff);
        Ok(before - records.len())
    }
}
