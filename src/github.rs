//! GitHub Repository Proxy
//!
//! Serves a single field of a public GitHub repository (stars, forks, ...)
//! as plain text so badges and pages can embed live counts. Raw API
//! responses are cached on disk under `repos/{user}/{repo}` and reused
//! until the namespace TTL expires.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use regex::Regex;
use reqwest::{header, Client};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::cache::ArtifactStore;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "Linkshot/1.0";

static PATH_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("path parameter pattern compiles"));

// == GitHub Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GithubError {
    #[error("missing parameters: user, repo, type")]
    MissingParameters,

    #[error("invalid user or repo")]
    InvalidRepo,

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The API could not be reached; details are logged, not served
    #[error("Error fetching from GitHub")]
    Network(String),

    #[error("GitHub API error: {0}")]
    Status(u16),

    #[error("failed to read GitHub response: {0}")]
    Body(String),

    #[error("invalid JSON from GitHub")]
    InvalidJson,

    #[error("Field '{0}' not found")]
    FieldNotFound(String),
}

impl GithubError {
    pub fn status(&self) -> StatusCode {
        match self {
            GithubError::MissingParameters | GithubError::InvalidRepo | GithubError::UnsupportedType(_) => {
                StatusCode::BAD_REQUEST
            }
            GithubError::Network(_) | GithubError::Status(_) | GithubError::InvalidJson => StatusCode::BAD_GATEWAY,
            GithubError::FieldNotFound(_) => StatusCode::NOT_FOUND,
            GithubError::Client(_) | GithubError::Body(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == Repo Field ==
/// A repository attribute exposed by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoField {
    Name,
    Description,
    Stars,
    Forks,
    Issues,
    Watchers,
}

impl RepoField {
    /// Key of this field in the GitHub repository JSON.
    pub fn json_key(self) -> &'static str {
        match self {
            RepoField::Name => "name",
            RepoField::Description => "description",
            RepoField::Stars => "stargazers_count",
            RepoField::Forks => "forks_count",
            RepoField::Issues => "open_issues_count",
            RepoField::Watchers => "subscribers_count",
        }
    }
}

impl FromStr for RepoField {
    type Err = GithubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(RepoField::Name),
            "description" => Ok(RepoField::Description),
            "stars" => Ok(RepoField::Stars),
            "forks" => Ok(RepoField::Forks),
            "issues" => Ok(RepoField::Issues),
            "watchers" => Ok(RepoField::Watchers),
            other => Err(GithubError::UnsupportedType(other.to_string())),
        }
    }
}

// == Repo Fetcher ==
/// Source of raw repository JSON.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    async fn fetch_repo(&self, user: &str, repo: &str) -> Result<Vec<u8>, GithubError>;
}

/// Fetches from the public GitHub REST API.
pub struct HttpRepoFetcher {
    http: Client,
    base_url: String,
}

impl HttpRepoFetcher {
    pub fn new(timeout: Duration) -> Result<Self, GithubError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GithubError::Client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
        })
    }

    /// Points the fetcher at a GitHub-compatible API, e.g. an Enterprise host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl RepoFetcher for HttpRepoFetcher {
    async fn fetch_repo(&self, user: &str, repo: &str) -> Result<Vec<u8>, GithubError> {
        let url = format!("{}/repos/{user}/{repo}", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| GithubError::Network(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(GithubError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GithubError::Body(e.to_string()))?;
        debug!(url = %url, bytes = body.len(), "fetched repository from GitHub");
        Ok(body.to_vec())
    }
}

// == GitHub Service ==
pub struct GithubService {
    store: Arc<dyn ArtifactStore>,
    cache_enabled: bool,
    fetcher: Arc<dyn RepoFetcher>,
}

impl GithubService {
    pub fn new(store: Arc<dyn ArtifactStore>, fetcher: Arc<dyn RepoFetcher>) -> Self {
        Self {
            store,
            cache_enabled: true,
            fetcher,
        }
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Returns `field` of `user/repo` rendered as text.
    ///
    /// Parameters are validated before any cache or network access. Cache
    /// read and write failures are logged and never fail the request.
    pub async fn repo_field(&self, user: &str, repo: &str, field: &str) -> Result<String, GithubError> {
        if user.is_empty() || repo.is_empty() || field.is_empty() {
            return Err(GithubError::MissingParameters);
        }
        if !PATH_PARAM.is_match(user) || !PATH_PARAM.is_match(repo) {
            return Err(GithubError::InvalidRepo);
        }
        let parsed: RepoField = field.parse()?;

        let key = format!("repos/{user}/{repo}");
        let data = match self.cached(&key).await {
            Some(data) => {
                debug!(key = %key, "GitHub response served from cache");
                data
            }
            None => {
                let data = self.fetcher.fetch_repo(user, repo).await.inspect_err(|e| {
                    error!(user, repo, error = ?e, "GitHub fetch failed");
                })?;
                self.remember(&key, data.clone()).await;
                info!(user, repo, "GitHub repository fetched");
                data
            }
        };

        let json: serde_json::Map<String, Value> =
            serde_json::from_slice(&data).map_err(|_| GithubError::InvalidJson)?;
        json.get(parsed.json_key())
            .map(render_value)
            .ok_or_else(|| GithubError::FieldNotFound(field.to_string()))
    }

    async fn cached(&self, key: &str) -> Option<Vec<u8>> {
        if !self.cache_enabled {
            return None;
        }
        let store = self.store.clone();
        let owned = key.to_string();
        match tokio::task::spawn_blocking(move || store.find(&owned)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                error!(key, error = %e, "error checking GitHub cache");
                None
            }
            Err(e) => {
                error!(key, error = %e, "GitHub cache lookup task failed");
                None
            }
        }
    }

    async fn remember(&self, key: &str, data: Vec<u8>) {
        if !self.cache_enabled {
            return;
        }
        let store = self.store.clone();
        let owned = key.to_string();
        match tokio::task::spawn_blocking(move || store.write(&owned, &data)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(key, error = %e, "error writing to GitHub cache"),
            Err(e) => error!(key, error = %e, "GitHub cache write task failed"),
        }
    }
}

/// Strings are served unquoted and `null` as empty text; numbers and other
/// values keep their JSON form.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DiskCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const REPO_JSON: &str = r#"{
        "name": "butterfly",
        "description": null,
        "stargazers_count": 1234,
        "forks_count": 56,
        "open_issues_count": 7,
        "subscribers_count": 8
    }"#;

    struct StubFetcher {
        response: Result<Vec<u8>, GithubError>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn new(response: Result<&str, GithubError>) -> Self {
            Self {
                response: response.map(|s| s.as_bytes().to_vec()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RepoFetcher for StubFetcher {
        async fn fetch_repo(&self, _: &str, _: &str) -> Result<Vec<u8>, GithubError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn service(dir: &TempDir, fetcher: Arc<StubFetcher>) -> GithubService {
        GithubService::new(Arc::new(DiskCache::new(dir.path())), fetcher)
    }

    #[tokio::test]
    async fn test_fields_rendered() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(StubFetcher::new(Ok(REPO_JSON))));

        assert_eq!(svc.repo_field("chimbori", "butterfly", "name").await.unwrap(), "butterfly");
        assert_eq!(svc.repo_field("chimbori", "butterfly", "stars").await.unwrap(), "1234");
        assert_eq!(svc.repo_field("chimbori", "butterfly", "watchers").await.unwrap(), "8");
        assert_eq!(svc.repo_field("chimbori", "butterfly", "description").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_response_cached_per_repo() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new(Ok(REPO_JSON)));
        let svc = service(&dir, fetcher.clone());

        svc.repo_field("chimbori", "butterfly", "stars").await.unwrap();
        svc.repo_field("chimbori", "butterfly", "forks").await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let cache = DiskCache::new(dir.path());
        assert_eq!(cache.find("repos/chimbori/butterfly").unwrap(), Some(REPO_JSON.as_bytes().to_vec()));

        svc.repo_field("chimbori", "other", "stars").await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_always_fetches() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new(Ok(REPO_JSON)));
        let svc = service(&dir, fetcher.clone()).with_cache_enabled(false);

        svc.repo_field("chimbori", "butterfly", "stars").await.unwrap();
        svc.repo_field("chimbori", "butterfly", "stars").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(DiskCache::new(dir.path()).find("repos/chimbori/butterfly").unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_params_rejected_before_fetch() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new(Ok(REPO_JSON)));
        let svc = service(&dir, fetcher.clone());

        assert_eq!(
            svc.repo_field("chim bori", "butterfly", "stars").await,
            Err(GithubError::InvalidRepo)
        );
        assert_eq!(
            svc.repo_field("chimbori", "butterfly%2F..", "stars").await,
            Err(GithubError::InvalidRepo)
        );
        assert_eq!(
            svc.repo_field("chimbori", "butterfly", "license").await,
            Err(GithubError::UnsupportedType("license".into()))
        );
        assert_eq!(svc.repo_field("", "butterfly", "stars").await, Err(GithubError::MissingParameters));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_failures_not_cached() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(StubFetcher::new(Err(GithubError::Status(404)))));

        let err = svc.repo_field("chimbori", "missing", "stars").await.unwrap_err();
        assert_eq!(err.to_string(), "GitHub API error: 404");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(DiskCache::new(dir.path()).find("repos/chimbori/missing").unwrap(), None);
    }

    #[tokio::test]
    async fn test_bad_payloads() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(StubFetcher::new(Ok("<html>rate limited</html>"))));
        assert_eq!(
            svc.repo_field("chimbori", "butterfly", "stars").await,
            Err(GithubError::InvalidJson)
        );

        let dir = TempDir::new().unwrap();
        let svc = service(&dir, Arc::new(StubFetcher::new(Ok(r#"{"name": "butterfly"}"#))));
        let err = svc.repo_field("chimbori", "butterfly", "forks").await.unwrap_err();
        assert_eq!(err, GithubError::FieldNotFound("forks".into()));
        assert_eq!(err.to_string(), "Field 'forks' not found");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GithubError::InvalidRepo.status(), StatusCode::BAD_REQUEST);
        assert_eq!(GithubError::UnsupportedType("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(GithubError::Network("reset".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(GithubError::Network("reset".into()).to_string(), "Error fetching from GitHub");
        assert_eq!(GithubError::Body("eof".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
