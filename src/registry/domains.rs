//! Domain Registry
//!
//! Hostnames the service may render, with tri-state authorization.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::RegistryError;

// == Domain ==
/// A registered hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Domain {
    pub hostname: String,
    /// When set, an authorized record also covers every subdomain
    pub include_subdomains: bool,
    /// `None` = not yet triaged, `Some(true)` = allowed, `Some(false)` = blocked
    pub authorized: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    pub fn new(hostname: impl Into<String>, include_subdomains: bool, authorized: Option<bool>) -> Self {
        let now = Utc::now();
        Self {
            hostname: hostname.into(),
            include_subdomains,
            authorized,
            created_at: now,
            updated_at: now,
        }
    }

    /// An allowed record for `hostname`.
    pub fn allowed(hostname: impl Into<String>, include_subdomains: bool) -> Self {
        Self::new(hostname, include_subdomains, Some(true))
    }

    /// A blocked record, as registered on first sight of an unknown hostname.
    pub fn unauthorized(hostname: impl Into<String>) -> Self {
        Self::new(hostname, false, Some(false))
    }

    /// Parses an allow-list entry; a leading `*.` includes subdomains.
    pub fn from_pattern(pattern: &str) -> Self {
        match pattern.strip_prefix("*.") {
            Some(hostname) => Self::allowed(hostname, true),
            None => Self::allowed(pattern, false),
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized == Some(true)
    }
}

// == Domain Registry ==
/// Storage for domain records. Backends serialize their own writes.
#[async_trait]
pub trait DomainRegistry: Send + Sync {
    /// True if `hostname` has an authorized record, or an authorized ancestor
    /// record with `include_subdomains` set.
    async fn is_authorized(&self, hostname: &str) -> Result<bool, RegistryError>;

    /// Registers `hostname` as unauthorized. No-op if a record already exists.
    async fn insert_unauthorized(&self, hostname: &str) -> Result<(), RegistryError>;

    /// Inserts or replaces a record, keeping the original creation time.
    async fn upsert(&self, domain: Domain) -> Result<(), RegistryError>;

    async fn get(&self, hostname: &str) -> Result<Option<Domain>, RegistryError>;

    /// All records, sorted by hostname.
    async fn list(&self) -> Result<Vec<Domain>, RegistryError>;

    /// Returns whether a record was removed.
    async fn delete(&self, hostname: &str) -> Result<bool, RegistryError>;

    /// Removes records that are not authorized and were last updated more
    /// than `retention` ago. Returns the number removed.
    async fn delete_unauthorized_stale(&self, retention: Duration) -> Result<usize, RegistryError>;
}

/// Yields `hostname` followed by each ancestor split at a label boundary:
/// `a.b.com`, `b.com`, `com`.
fn self_and_ancestors(hostname: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(hostname), |h| h.split_once('.').map(|(_, rest)| rest))
        .filter(|h| !h.is_empty())
}

/// Exact authorized record, or an authorized ancestor covering subdomains.
fn matches_authorized(domains: &HashMap<String, Domain>, hostname: &str) -> bool {
    if domains.get(hostname).is_some_and(Domain::is_authorized) {
        return true;
    }
    self_and_ancestors(hostname)
        .skip(1)
        .filter_map(|ancestor| domains.get(ancestor))
        .any(|d| d.include_subdomains && d.is_authorized())
}

// == In-Memory Registry ==
/// Process-local registry.
#[derive(Debug, Default)]
pub struct InMemoryDomainRegistry {
    domains: RwLock<HashMap<String, Domain>>,
}

impl InMemoryDomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with `domains`.
    pub fn with_domains(domains: impl IntoIterator<Item = Domain>) -> Self {
        let map = domains
            .into_iter()
            .map(|d| (d.hostname.clone(), d))
            .collect();
        Self {
            domains: RwLock::new(map),
        }
    }
}

#[async_trait]
impl DomainRegistry for InMemoryDomainRegistry {
    async fn is_authorized(&self, hostname: &str) -> Result<bool, RegistryError> {
        let domains = self.domains.read().await;
        Ok(matches_authorized(&domains, hostname))
    }

    async fn insert_unauthorized(&self, hostname: &str) -> Result<(), RegistryError> {
        let mut domains = self.domains.write().await;
        domains
            .entry(hostname.to_string())
            .or_insert_with(|| Domain::unauthorized(hostname));
        Ok(())
    }

    async fn upsert(&self, mut domain: Domain) -> Result<(), RegistryError> {
        let mut domains = self.domains.write().await;
        if let Some(existing) = domains.get(&domain.hostname) {
            domain.created_at = existing.created_at;
        }
        domain.updated_at = Utc::now();
        domains.insert(domain.hostname.clone(), domain);
        Ok(())
    }

    async fn get(&self, hostname: &str) -> Result<Option<Domain>, RegistryError> {
        Ok(self.domains.read().await.get(hostname).cloned())
    }

    async fn list(&self) -> Result<Vec<Domain>, RegistryError> {
        let mut all: Vec<Domain> = self.domains.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        Ok(all)
    }

    async fn delete(&self, hostname: &str) -> Result<bool, RegistryError> {
        Ok(self.domains.write().await.remove(hostname).is_some())
    }

    async fn delete_unauthorized_stale(&self, retention: Duration) -> Result<usize, RegistryError> {
        let cutoff = Utc::now() - retention;
        let mut domains = self.domains.write().await;
        let before = domains.len();
        domains.retain(|_, d| d.is_authorized() || d.updated_at >= cutoff);
        Ok(before - domains.len())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InMemoryDomainRegistry {
        InMemoryDomainRegistry::with_domains([
            Domain::allowed("chimbori.com", true),
            Domain::allowed("manas.tungare.name", false),
        ])
    }

    #[test]
    fn test_from_pattern() {
        let wildcard = Domain::from_pattern("*.tungare.name");
        assert_eq!(wildcard.hostname, "tungare.name");
        assert!(wildcard.include_subdomains);
        assert!(wildcard.is_authorized());

        let exact = Domain::from_pattern("chimbori.com");
        assert_eq!(exact.hostname, "chimbori.com");
        assert!(!exact.include_subdomains);
    }

    #[test]
    fn test_self_and_ancestors() {
        let all: Vec<&str> = self_and_ancestors("a.b.example.com").collect();
        assert_eq!(all, vec!["a.b.example.com", "b.example.com", "example.com", "com"]);
    }

    #[tokio::test]
    async fn test_exact_match() {
        let registry = registry();
        assert!(registry.is_authorized("chimbori.com").await.unwrap());
        assert!(registry.is_authorized("manas.tungare.name").await.unwrap());
    }

    #[tokio::test]
    async fn test_subdomain_match_requires_inclusion() {
        let registry = registry();
        assert!(registry.is_authorized("apps.chimbori.com").await.unwrap());
        assert!(registry.is_authorized("deep.apps.chimbori.com").await.unwrap());
        assert!(!registry.is_authorized("www.manas.tungare.name").await.unwrap());
    }

    #[tokio::test]
    async fn test_suffix_without_label_boundary_rejected() {
        let registry = registry();
        assert!(!registry.is_authorized("evilchimbori.com").await.unwrap());
        assert!(!registry
            .is_authorized("malicious.chimbori.com.evil.com")
            .await
            .unwrap());
        assert!(!registry.is_authorized("chimboricom.attacker.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_blocked_and_untriaged_not_authorized() {
        let registry = InMemoryDomainRegistry::with_domains([
            Domain::new("blocked.com", true, Some(false)),
            Domain::new("pending.com", true, None),
        ]);
        assert!(!registry.is_authorized("blocked.com").await.unwrap());
        assert!(!registry.is_authorized("sub.blocked.com").await.unwrap());
        assert!(!registry.is_authorized("pending.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_unauthorized_is_idempotent() {
        let registry = registry();

        registry.insert_unauthorized("evil.com").await.unwrap();
        registry.insert_unauthorized("evil.com").await.unwrap();

        let domain = registry.get("evil.com").await.unwrap().unwrap();
        assert_eq!(domain.authorized, Some(false));
        assert_eq!(registry.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_insert_unauthorized_keeps_existing_record() {
        let registry = registry();

        registry.insert_unauthorized("chimbori.com").await.unwrap();

        assert!(registry.is_authorized("chimbori.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at() {
        let registry = InMemoryDomainRegistry::new();
        registry.insert_unauthorized("example.com").await.unwrap();
        let created = registry.get("example.com").await.unwrap().unwrap().created_at;

        registry.upsert(Domain::allowed("example.com", false)).await.unwrap();

        let updated = registry.get("example.com").await.unwrap().unwrap();
        assert_eq!(updated.created_at, created);
        assert!(updated.is_authorized());
    }

    #[tokio::test]
    async fn test_delete() {
        let registry = registry();
        assert!(registry.delete("chimbori.com").await.unwrap());
        assert!(!registry.delete("chimbori.com").await.unwrap());
        assert!(!registry.is_authorized("chimbori.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_unauthorized_stale() {
        let mut stale = Domain::unauthorized("stale.com");
        stale.updated_at = Utc::now() - Duration::days(10);
        let mut old_but_allowed = Domain::allowed("old.com", false);
        old_but_allowed.updated_at = Utc::now() - Duration::days(10);
        let registry = InMemoryDomainRegistry::with_domains([
            stale,
            old_but_allowed,
            Domain::unauthorized("recent.com"),
        ]);

        let removed = registry
            .delete_unauthorized_stale(Duration::days(7))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let names: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.hostname)
            .collect();
        assert_eq!(names, vec!["old.com", "recent.com"]);
    }
}
